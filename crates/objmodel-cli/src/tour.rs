//! The classic class tutorial, built on the object model.
//!
//! Every scenario appends the lines it would print to the report, and exports the
//! instances it created so `--json` can show their final state.

use objmodel::{ClassDef, ErrorKind, Object, ResourceTracker, RunResult, Runtime, Signature, Value, args};

/// What a run of the tour produced.
#[derive(Debug, Default)]
pub struct Report {
    pub lines: Vec<String>,
    /// Final state of every instance the tour created, labelled by variable name.
    pub instances: Vec<(String, Object)>,
}

impl Report {
    fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn value(&mut self, value: &Value) {
        self.lines.push(value.to_string());
    }

    fn keep<T: ResourceTracker>(&mut self, rt: &Runtime<T>, label: &str, value: &Value) -> RunResult<()> {
        self.instances.push((label.to_owned(), rt.export(value)?));
        Ok(())
    }
}

/// Runs every scenario in order.
pub fn run<T: ResourceTracker>(rt: &mut Runtime<T>) -> RunResult<Report> {
    let mut report = Report::default();
    dogs(rt, &mut report)?;
    counter(rt, &mut report)?;
    person(rt, &mut report)?;
    bank_account(rt, &mut report)?;
    employee(rt, &mut report)?;
    calculator(rt, &mut report)?;
    Ok(report)
}

fn dogs<T: ResourceTracker>(rt: &mut Runtime<T>, report: &mut Report) -> RunResult<()> {
    let dog = rt.define_class(
        ClassDef::new("Dog")
            .instance_method("__init__", Signature::new(["name", "age"]), |frame, args| {
                let [name, age] = args.into_array("__init__")?;
                frame.set("name", name)?;
                frame.set("age", age)?;
                Ok(Value::None)
            })
            .instance_method("speak", Signature::new(["sound"]), |frame, args| {
                Ok(format!("{} says {}", frame.get("name")?, args[0]).into())
            }),
    )?;
    let fido = rt.construct(dog, args!["Fido", 5])?;
    report.value(&rt.get_attr(fido, "name")?);
    report.value(&rt.invoke(fido, "speak", args!["woof"])?);

    let puppy = rt.define_class(ClassDef::new("Puppy").parent(dog).instance_method(
        "speak",
        Signature::empty().optional("sound", "yip"),
        |frame, args| frame.super_invoke("speak", args),
    ))?;
    let buddy = rt.construct(puppy, args!["Buddy", 1])?;
    report.value(&rt.get_attr(buddy, "name")?);
    report.value(&rt.invoke(buddy, "speak", ())?);
    report.value(&rt.invoke(buddy, "speak", args!["arf"])?);

    report.keep(rt, "fido", &fido.into())?;
    report.keep(rt, "puppy", &buddy.into())
}

fn counter<T: ResourceTracker>(rt: &mut Runtime<T>, report: &mut Report) -> RunResult<()> {
    let counter = rt.define_class(
        ClassDef::new("Counter")
            .attribute("count", 0)
            .instance_method("__init__", Signature::empty(), |frame, _| {
                let counter = frame.defining_class();
                let count = frame.get_class_attribute(counter, "count")?;
                frame.set_class_attribute(counter, "count", count.add(&Value::Int(1))?)?;
                Ok(Value::None)
            }),
    )?;
    for _ in 0..2 {
        let made = rt.construct(counter, ())?;
        rt.release(made)?;
    }
    report.value(&rt.get_class_attribute(counter, "count")?);
    Ok(())
}

fn person<T: ResourceTracker>(rt: &mut Runtime<T>, report: &mut Report) -> RunResult<()> {
    let person = rt.define_class(
        ClassDef::new("Person")
            .instance_method("__init__", Signature::new(["name"]), |frame, args| {
                frame.set("name", args[0].clone())?;
                Ok(Value::None)
            })
            .instance_method("__str__", Signature::empty(), |frame, _| {
                Ok(format!("Person({})", frame.get("name")?).into())
            }),
    )?;
    let nick = Value::from(rt.construct(person, args!["Nick"])?);
    report.line(rt.display(&nick)?);
    report.keep(rt, "nick", &nick)
}

fn bank_account<T: ResourceTracker>(rt: &mut Runtime<T>, report: &mut Report) -> RunResult<()> {
    let bank = rt.define_class(
        ClassDef::new("BankAccount")
            .instance_method(
                "__init__",
                Signature::new(["owner"]).optional("balance", 0),
                |frame, args| {
                    let [owner, balance] = args.into_array("__init__")?;
                    frame.set("owner", owner)?;
                    frame.set("balance", balance)?;
                    Ok(Value::None)
                },
            )
            .instance_method("deposit", Signature::new(["amount"]), |frame, args| {
                let balance = frame.get("balance")?.add(&args[0])?;
                frame.set("balance", balance.clone())?;
                Ok(format!("{} deposited ${}. New balance: ${balance}", frame.get("owner")?, args[0]).into())
            })
            .instance_method("withdraw", Signature::new(["amount"]), |frame, args| {
                let balance = frame.get("balance")?;
                if args[0].as_float()? > balance.as_float()? {
                    return Ok("Insufficient funds".into());
                }
                let balance = balance.sub(&args[0])?;
                frame.set("balance", balance.clone())?;
                Ok(format!("Withdrew ${}. New balance: ${balance}", args[0]).into())
            }),
    )?;
    let account = rt.construct(bank, args!["Alice", 100])?;
    report.value(&rt.invoke(account, "deposit", args![50])?);
    report.value(&rt.invoke(account, "withdraw", args![30])?);
    report.value(&rt.invoke(account, "withdraw", args![1000])?);
    report.keep(rt, "account", &account.into())
}

fn employee<T: ResourceTracker>(rt: &mut Runtime<T>, report: &mut Report) -> RunResult<()> {
    let employee = rt.define_class(
        ClassDef::new("Employee")
            .attribute("company", "TechCorp")
            .attribute("employee_count", 0)
            .instance_method("__init__", Signature::new(["name", "salary"]), |frame, args| {
                let [name, salary] = args.into_array("__init__")?;
                frame.set("name", name)?;
                frame.set("salary", salary)?;
                let employee = frame.defining_class();
                let count = frame.get_class_attribute(employee, "employee_count")?;
                frame.set_class_attribute(employee, "employee_count", count.add(&Value::Int(1))?)?;
                Ok(Value::None)
            })
            .class_method("from_string", Signature::new(["emp_string"]), |frame, args| {
                let text = args[0].as_str()?;
                let (name, salary) = text
                    .split_once('-')
                    .ok_or_else(|| ErrorKind::value_error(format!("expected 'name-salary', got '{text}'")))?;
                let salary: i64 = salary
                    .parse()
                    .map_err(|_| ErrorKind::value_error(format!("invalid salary '{salary}'")))?;
                let cls = frame.cls()?;
                Ok(frame.construct(cls, args![name, salary])?.into())
            })
            .class_method("set_company", Signature::new(["new_company"]), |frame, args| {
                let cls = frame.cls()?;
                frame.set_class_attribute(cls, "company", args[0].clone())?;
                Ok(Value::None)
            })
            .class_method("get_employee_count", Signature::empty(), |frame, _| {
                Ok(format!("Total employees: {}", frame.class_attr("employee_count")?).into())
            }),
    )?;
    let bob = Value::from(rt.construct(employee, args!["Bob", 50000])?);
    let charlie = rt.invoke(employee, "from_string", args!["Charlie-60000"])?;
    report.value(&rt.invoke(employee, "get_employee_count", ())?);
    rt.invoke(employee, "set_company", args!["NewTech"])?;
    report.value(&rt.get_class_attribute(employee, "company")?);

    report.keep(rt, "emp1", &bob)?;
    report.keep(rt, "emp2", &charlie)
}

fn calculator<T: ResourceTracker>(rt: &mut Runtime<T>, report: &mut Report) -> RunResult<()> {
    let calculator = rt.define_class(
        ClassDef::new("Calculator")
            .static_method("add", Signature::new(["x", "y"]), |_, args| args[0].add(&args[1]))
            .static_method("multiply", Signature::new(["x", "y"]), |_, args| args[0].mul(&args[1]))
            .static_method("is_even", Signature::new(["num"]), |_, args| {
                Ok((args[0].as_int()? % 2 == 0).into())
            }),
    )?;
    report.value(&rt.invoke(calculator, "add", args![5, 3])?);
    report.value(&rt.invoke(calculator, "is_even", args![10])?);
    let calc = rt.construct(calculator, ())?;
    report.value(&rt.invoke(calc, "multiply", args![4, 7])?);
    report.keep(rt, "calc", &calc.into())
}

#[cfg(test)]
mod tests {
    use objmodel::{LimitedTracker, NoLimitTracker, ResourceLimits};

    use super::*;

    #[test]
    fn tour_output() {
        let mut rt = Runtime::new(NoLimitTracker);
        let report = run(&mut rt).unwrap();
        assert_eq!(
            report.lines,
            vec![
                "Fido",
                "Fido says woof",
                "Buddy",
                "Buddy says yip",
                "Buddy says arf",
                "2",
                "Person(Nick)",
                "Alice deposited $50. New balance: $150",
                "Withdrew $30. New balance: $120",
                "Insufficient funds",
                "Total employees: 2",
                "NewTech",
                "8",
                "True",
                "28",
            ]
        );
        let labels: Vec<&str> = report.instances.iter().map(|(label, _)| label.as_str()).collect();
        assert_eq!(labels, vec!["fido", "puppy", "nick", "account", "emp1", "emp2", "calc"]);
    }

    #[test]
    fn tour_fails_under_tight_limits() {
        let mut rt = Runtime::new(LimitedTracker::new(ResourceLimits::new().max_allocations(4)));
        let err = run(&mut rt).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MemoryError);
    }
}
