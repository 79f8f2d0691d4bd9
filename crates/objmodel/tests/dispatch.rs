//! Tests for method resolution, binding and class attribute visibility.

use objmodel::{
    ClassDef, ClassId, ErrorKind, MethodKind, NoLimitTracker, Runtime, Signature, Target, Value, args,
};
use pretty_assertions::assert_eq;

type Rt = Runtime<NoLimitTracker>;
type Def = ClassDef<NoLimitTracker>;

/// `Base` with an instance method, a class method reporting its binding, a static
/// method and a `count` class attribute; `Child` and `Grandchild` add nothing.
fn hierarchy(rt: &mut Rt) -> (ClassId, ClassId, ClassId) {
    let base = rt
        .define_class(
            Def::new("Base")
                .attribute("count", 0)
                .instance_method("__init__", Signature::empty().optional("tag", "none"), |frame, args| {
                    frame.set("tag", args[0].clone())?;
                    Ok(Value::None)
                })
                .instance_method("describe", Signature::empty(), |frame, _| {
                    Ok(format!("tag={}", frame.get("tag")?).into())
                })
                .class_method("which", Signature::empty(), |frame, _| Ok(frame.cls()?.into()))
                .static_method("twice", Signature::new(["x"]), |_, args| args[0].add(&args[0])),
        )
        .unwrap();
    let child = rt.define_class(Def::new("Child").parent(base)).unwrap();
    let grandchild = rt.define_class(Def::new("Grandchild").parent(child)).unwrap();
    (base, child, grandchild)
}

// =============================================================================
// 1. Resolution
// =============================================================================

/// An inherited method behaves on a subclass instance as on the parent.
#[test]
fn inherited_method_behaves_like_parent() {
    let mut rt = Rt::new(NoLimitTracker);
    let (base, _, grandchild) = hierarchy(&mut rt);
    let a = rt.construct(base, args!["x"]).unwrap();
    let b = rt.construct(grandchild, args!["x"]).unwrap();
    assert_eq!(
        rt.invoke(a, "describe", ()).unwrap(),
        rt.invoke(b, "describe", ()).unwrap()
    );
}

/// `resolve_method` reports the defining class, whatever the start.
#[test]
fn resolve_method_reports_definer() {
    let mut rt = Rt::new(NoLimitTracker);
    let (base, _, grandchild) = hierarchy(&mut rt);
    let g = rt.construct(grandchild, ()).unwrap();

    let (definer, method) = rt.resolve_method(g, "describe").unwrap();
    assert_eq!(definer, base);
    assert_eq!(method.kind(), MethodKind::Instance);

    let (definer, method) = rt.resolve_method(grandchild, "which").unwrap();
    assert_eq!(definer, base);
    assert_eq!(method.kind(), MethodKind::Class);
}

/// Unknown names fail with `MethodNotFound` naming the starting class.
#[test]
fn unknown_method() {
    let mut rt = Rt::new(NoLimitTracker);
    let (_, child, _) = hierarchy(&mut rt);
    let err = rt.invoke(child, "fly", ()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MethodNotFound);
    assert_eq!(err.message(), Some("'Child' has no method 'fly'"));
}

/// The nearest definition wins over one further up the chain.
#[test]
fn override_shadows_parent_method() {
    let mut rt = Rt::new(NoLimitTracker);
    let (_, child, _) = hierarchy(&mut rt);
    let override_class = rt
        .define_class(
            Def::new("Loud")
                .parent(child)
                .instance_method("describe", Signature::empty(), |_, _| Ok("LOUD".into())),
        )
        .unwrap();
    let loud = rt.construct(override_class, ()).unwrap();
    assert_eq!(rt.invoke(loud, "describe", ()).unwrap(), Value::from("LOUD"));
}

/// Defining against an unknown parent fails and registers nothing.
#[test]
fn parent_not_found() {
    let mut rt = Rt::new(NoLimitTracker);
    let err = rt.define_class(Def::new("Orphan").parent("Ghost")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParentNotFound);
    assert_eq!(rt.class_id("Orphan").unwrap_err().kind(), ErrorKind::ClassNotFound);
}

// =============================================================================
// 2. Binding
// =============================================================================

/// A class method defined on an ancestor receives the class dispatch started from.
#[test]
fn class_method_binds_most_derived_class() {
    let mut rt = Rt::new(NoLimitTracker);
    let (base, child, grandchild) = hierarchy(&mut rt);
    assert_eq!(rt.invoke(base, "which", ()).unwrap(), Value::Class(base));
    assert_eq!(rt.invoke(child, "which", ()).unwrap(), Value::Class(child));
    assert_eq!(rt.invoke(grandchild, "which", ()).unwrap(), Value::Class(grandchild));

    let g = rt.construct(grandchild, ()).unwrap();
    assert_eq!(rt.invoke(g, "which", ()).unwrap(), Value::Class(grandchild));
}

/// A static method gives the same answer through a class and through an instance.
#[test]
fn static_method_is_binding_free() {
    let mut rt = Rt::new(NoLimitTracker);
    let (_, child, _) = hierarchy(&mut rt);
    let c = rt.construct(child, ()).unwrap();
    assert_eq!(
        rt.invoke(child, "twice", args![21]).unwrap(),
        rt.invoke(c, "twice", args![21]).unwrap()
    );
    assert_eq!(rt.invoke(c, "twice", args![21]).unwrap(), Value::Int(42));
}

/// Instance methods need an instance target.
#[test]
fn instance_method_through_class_is_type_error() {
    let mut rt = Rt::new(NoLimitTracker);
    let (base, _, _) = hierarchy(&mut rt);
    let err = rt.invoke(base, "describe", ()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeError);
    assert_eq!(err.message(), Some("describe() needs an instance of 'Base', got the class"));
}

/// Static bodies have neither an instance nor a class.
#[test]
fn static_body_has_no_binding() {
    let mut rt = Rt::new(NoLimitTracker);
    let probe = rt
        .define_class(Def::new("Probe").static_method("peek", Signature::empty(), |frame, _| {
            let this = frame.this().unwrap_err();
            let cls = frame.cls().unwrap_err();
            Ok(args![this.kind().to_string(), cls.kind().to_string()].into_vec().into())
        }))
        .unwrap();
    assert_eq!(
        rt.invoke(probe, "peek", ()).unwrap(),
        Value::List(vec![Value::from("TypeError"), Value::from("TypeError")])
    );
}

/// Values holding handles convert into targets; other values do not.
#[test]
fn target_from_value() {
    let mut rt = Rt::new(NoLimitTracker);
    let (base, _, _) = hierarchy(&mut rt);
    let b = rt.construct(base, ()).unwrap();

    let target = Target::try_from(Value::Instance(b)).unwrap();
    assert_eq!(rt.invoke(target, "describe", ()).unwrap(), Value::from("tag=none"));
    assert_eq!(Target::try_from(&Value::Class(base)).unwrap(), Target::Class(base));

    let err = Target::try_from(Value::Int(3)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeError);
}

// =============================================================================
// 3. Instance and class attributes
// =============================================================================

/// Setting an attribute on one instance never changes a sibling.
#[test]
fn sibling_instances_are_isolated() {
    let mut rt = Rt::new(NoLimitTracker);
    let (base, _, _) = hierarchy(&mut rt);
    let a = rt.construct(base, args!["a"]).unwrap();
    let b = rt.construct(base, args!["b"]).unwrap();

    rt.set_attr(a, "tag", "changed").unwrap();
    assert_eq!(rt.get_attr(a, "tag").unwrap(), Value::from("changed"));
    assert_eq!(rt.get_attr(b, "tag").unwrap(), Value::from("b"));
}

/// A class attribute write is visible from every instance of the class and its
/// descendants that has no shadow of its own.
#[test]
fn class_attribute_write_is_visible_everywhere() {
    let mut rt = Rt::new(NoLimitTracker);
    let (base, child, grandchild) = hierarchy(&mut rt);
    let b = rt.construct(base, ()).unwrap();
    let c = rt.construct(child, ()).unwrap();
    let g = rt.construct(grandchild, ()).unwrap();

    rt.set_class_attribute(base, "count", 7).unwrap();
    for id in [b, c, g] {
        assert_eq!(rt.get_attr(id, "count").unwrap(), Value::Int(7));
    }
    assert_eq!(rt.get_class_attribute(grandchild, "count").unwrap(), Value::Int(7));
}

/// Writing through a subclass creates a shadow on that subclass only.
#[test]
fn class_attribute_write_on_subclass_shadows() {
    let mut rt = Rt::new(NoLimitTracker);
    let (base, child, grandchild) = hierarchy(&mut rt);
    rt.set_class_attribute(child, "count", 5).unwrap();

    assert_eq!(rt.get_class_attribute(base, "count").unwrap(), Value::Int(0));
    assert_eq!(rt.get_class_attribute(child, "count").unwrap(), Value::Int(5));
    assert_eq!(rt.get_class_attribute(grandchild, "count").unwrap(), Value::Int(5));
    assert_eq!(rt.registry().class_attribute_owner(grandchild, "count").unwrap(), child);

    // later writes to the base no longer reach the shadowing branch
    rt.set_class_attribute(base, "count", 9).unwrap();
    assert_eq!(rt.get_class_attribute(grandchild, "count").unwrap(), Value::Int(5));
}

/// An instance attribute permanently shadows the class attribute for that instance.
#[test]
fn instance_attribute_shadows_class_attribute() {
    let mut rt = Rt::new(NoLimitTracker);
    let (base, _, _) = hierarchy(&mut rt);
    let a = rt.construct(base, ()).unwrap();
    let b = rt.construct(base, ()).unwrap();

    rt.set_attr(a, "count", 100).unwrap();
    rt.set_class_attribute(base, "count", 1).unwrap();

    assert_eq!(rt.get_attr(a, "count").unwrap(), Value::Int(100));
    assert_eq!(rt.get_attr(b, "count").unwrap(), Value::Int(1));
    assert_eq!(rt.get_class_attribute(base, "count").unwrap(), Value::Int(1));
}

/// Missing attributes fail with `AttributeNotFound`.
#[test]
fn attribute_not_found() {
    let mut rt = Rt::new(NoLimitTracker);
    let (base, child, _) = hierarchy(&mut rt);
    let c = rt.construct(child, ()).unwrap();

    let err = rt.get_attr(c, "missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AttributeNotFound);
    assert_eq!(err.message(), Some("'Child' has no attribute 'missing'"));
    assert_eq!(
        rt.get_class_attribute(base, "missing").unwrap_err().kind(),
        ErrorKind::AttributeNotFound
    );
    assert!(!rt.has_attr(c, "missing").unwrap());
    assert!(rt.has_attr(c, "count").unwrap());
    assert!(rt.has_attr(c, "tag").unwrap());
}

/// Instance attributes keep assignment order.
#[test]
fn instance_attributes_in_assignment_order() {
    let mut rt = Rt::new(NoLimitTracker);
    let (base, _, _) = hierarchy(&mut rt);
    let a = rt.construct(base, ()).unwrap();
    rt.set_attr(a, "z", 1).unwrap();
    rt.set_attr(a, "a", 2).unwrap();

    let names: Vec<String> = rt.instance_attributes(a).unwrap().into_keys().collect();
    assert_eq!(names, vec!["tag", "z", "a"]);
}

/// `is_instance` and `is_subclass` follow the chain.
#[test]
fn instance_and_subclass_checks() {
    let mut rt = Rt::new(NoLimitTracker);
    let (base, child, grandchild) = hierarchy(&mut rt);
    let c = Value::Instance(rt.construct(child, ()).unwrap());

    assert!(rt.is_instance(&c, base).unwrap());
    assert!(rt.is_instance(&c, child).unwrap());
    assert!(!rt.is_instance(&c, grandchild).unwrap());
    assert!(!rt.is_instance(&Value::Int(1), base).unwrap());
    assert!(rt.is_subclass(grandchild, base).unwrap());
    assert!(!rt.is_subclass(base, grandchild).unwrap());
}

/// A default is the literal captured at definition time; writing a class attribute of
/// the same name does not change it.
#[test]
fn defaults_ignore_class_attribute_writes() {
    let mut rt = Rt::new(NoLimitTracker);
    let greeter = rt
        .define_class(
            Def::new("Greeter")
                .attribute("greeting", "hello")
                .class_method("greet", Signature::empty().optional("greeting", "hello"), |_, args| {
                    Ok(args[0].clone())
                }),
        )
        .unwrap();
    assert_eq!(rt.invoke(greeter, "greet", ()).unwrap(), Value::from("hello"));

    rt.set_class_attribute(greeter, "greeting", "howdy").unwrap();
    assert_eq!(rt.get_class_attribute(greeter, "greeting").unwrap(), Value::from("howdy"));
    assert_eq!(rt.invoke(greeter, "greet", ()).unwrap(), Value::from("hello"));
    assert_eq!(rt.invoke(greeter, "greet", args!["hey"]).unwrap(), Value::from("hey"));
}

/// Each call gets its own copy of a default, so a body cannot alter it for later calls.
#[test]
fn defaults_are_fresh_per_call() {
    let mut rt = Rt::new(NoLimitTracker);
    let bin = rt
        .define_class(Def::new("Bin").static_method(
            "push",
            Signature::empty().optional("items", Value::List(Vec::new())),
            |_, args| {
                let [items] = args.into_array("push")?;
                let Value::List(mut items) = items else {
                    return Err(ErrorKind::type_error("items must be a list"));
                };
                items.push(Value::Int(1));
                Ok(Value::Int(i64::try_from(items.len()).unwrap_or(i64::MAX)))
            },
        ))
        .unwrap();
    assert_eq!(rt.invoke(bin, "push", ()).unwrap(), Value::Int(1));
    assert_eq!(rt.invoke(bin, "push", ()).unwrap(), Value::Int(1));
}

// =============================================================================
// 4. Parent delegation
// =============================================================================

/// Delegation resolves above the defining class even when the call started lower.
#[test]
fn super_resolves_above_defining_class() {
    let mut rt = Rt::new(NoLimitTracker);
    let a = rt
        .define_class(Def::new("A").instance_method("name", Signature::empty(), |_, _| Ok("A".into())))
        .unwrap();
    let b = rt
        .define_class(
            Def::new("B")
                .parent(a)
                .instance_method("name", Signature::empty(), |frame, _| {
                    let above = frame.super_invoke("name", ())?;
                    Ok(format!("B>{above}").into())
                }),
        )
        .unwrap();
    let c = rt
        .define_class(
            Def::new("C")
                .parent(b)
                .instance_method("name", Signature::empty(), |frame, _| {
                    let above = frame.super_invoke("name", ())?;
                    Ok(format!("C>{above}").into())
                }),
        )
        .unwrap();
    let d = rt.define_class(Def::new("D").parent(c)).unwrap();

    let obj = rt.construct(d, ()).unwrap();
    assert_eq!(rt.invoke(obj, "name", ()).unwrap(), Value::from("C>B>A"));
}

/// Class-bound delegation keeps the most-derived class.
#[test]
fn super_keeps_class_binding() {
    let mut rt = Rt::new(NoLimitTracker);
    let (_, child, grandchild) = hierarchy(&mut rt);
    let special = rt
        .define_class(
            Def::new("Special")
                .parent(grandchild)
                .class_method("which", Signature::empty(), |frame, _| frame.super_invoke("which", ())),
        )
        .unwrap();
    assert_eq!(rt.invoke(special, "which", ()).unwrap(), Value::Class(special));
    assert_ne!(rt.invoke(special, "which", ()).unwrap(), Value::Class(child));
}

/// Delegating from a root class, or to a name nobody above defines, fails.
#[test]
fn super_without_parent_definition() {
    let mut rt = Rt::new(NoLimitTracker);
    let root = rt
        .define_class(
            Def::new("Root").instance_method("go", Signature::empty(), |frame, _| frame.super_invoke("go", ())),
        )
        .unwrap();
    let r = rt.construct(root, ()).unwrap();
    let err = rt.invoke(r, "go", ()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MethodNotFound);
    assert_eq!(err.message(), Some("'Root' has no parent to delegate 'go' to"));

    let leaf = rt
        .define_class(
            Def::new("Leaf")
                .parent(root)
                .instance_method("fly", Signature::empty(), |frame, _| frame.super_invoke("fly", ())),
        )
        .unwrap();
    let l = rt.construct(leaf, ()).unwrap();
    assert_eq!(rt.invoke(l, "fly", ()).unwrap_err().kind(), ErrorKind::MethodNotFound);
}

// =============================================================================
// 5. Redefinition
// =============================================================================

/// Redefining a name rebinds it; existing instances keep their old class.
#[test]
fn redefinition_rebinds_name() {
    let mut rt = Rt::new(NoLimitTracker);
    let v1 = rt
        .define_class(Def::new("Widget").instance_method("v", Signature::empty(), |_, _| Ok(Value::Int(1))))
        .unwrap();
    let old = rt.construct(v1, ()).unwrap();
    let v2 = rt
        .define_class(Def::new("Widget").instance_method("v", Signature::empty(), |_, _| Ok(Value::Int(2))))
        .unwrap();
    let new = rt.construct(rt.class_id("Widget").unwrap(), ()).unwrap();

    assert_ne!(v1, v2);
    assert_eq!(rt.invoke(old, "v", ()).unwrap(), Value::Int(1));
    assert_eq!(rt.invoke(new, "v", ()).unwrap(), Value::Int(2));
}
