//! Minimal interpreter for the Jasmin subset the generator emits.
//!
//! Runs one class, treating `io/println` and `io/print` as output sinks and
//! superclass constructors as no-ops. Every frame checks that the operand
//! stack stays within `.limit stack` and is empty when the method returns.

use std::rc::Rc;

use rustc_hash::FxHashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Ref(usize),
    Null,
}

impl Value {
    pub fn int(self) -> i32 {
        match self {
            Value::Int(v) => v,
            other => panic!("expected int, found {other:?}"),
        }
    }
}

enum HeapObj {
    Object(FxHashMap<String, Value>),
    Array(Vec<Value>),
}

struct Insn {
    op: String,
    arg: String,
}

struct MethodCode {
    is_static: bool,
    max_stack: usize,
    max_locals: usize,
    code: Vec<Insn>,
    labels: FxHashMap<String, usize>,
}

pub struct Machine {
    class: String,
    methods: FxHashMap<String, Rc<MethodCode>>,
    heap: Vec<HeapObj>,
    /// Values passed to `io.println` / `io.print`, in order.
    pub output: Vec<i32>,
    /// `Class.method` for every own-class invocation, in order.
    pub calls: Vec<String>,
}

impl Machine {
    pub fn load(jasmin: &str) -> Self {
        let mut class = String::new();
        let mut methods = FxHashMap::default();
        let mut current: Option<(String, MethodCode)> = None;

        for line in jasmin.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(name) = line.strip_prefix(".class public ") {
                class = name.to_owned();
            } else if line.starts_with(".super") || line.starts_with(".field") {
                continue;
            } else if let Some(header) = line.strip_prefix(".method ") {
                let signature = header.split_whitespace().last().unwrap_or_default();
                let name = signature.split('(').next().unwrap_or_default().to_owned();
                current = Some((
                    name,
                    MethodCode {
                        is_static: header.split_whitespace().any(|w| w == "static"),
                        max_stack: 0,
                        max_locals: 0,
                        code: Vec::new(),
                        labels: FxHashMap::default(),
                    },
                ));
            } else if line == ".end method" {
                let (name, code) = current.take().unwrap_or_else(|| panic!("stray .end method"));
                methods.insert(name, Rc::new(code));
            } else {
                let (_, method) = current
                    .as_mut()
                    .unwrap_or_else(|| panic!("instruction outside a method: {line}"));
                if let Some(n) = line.strip_prefix(".limit stack ") {
                    method.max_stack = n.parse().unwrap_or_else(|_| panic!("bad limit {n}"));
                } else if let Some(n) = line.strip_prefix(".limit locals ") {
                    method.max_locals = n.parse().unwrap_or_else(|_| panic!("bad limit {n}"));
                } else if let Some(label) = line.strip_suffix(':') {
                    method.labels.insert(label.to_owned(), method.code.len());
                } else {
                    let (op, arg) = line.split_once(' ').unwrap_or((line, ""));
                    method.code.push(Insn {
                        op: op.to_owned(),
                        arg: arg.to_owned(),
                    });
                }
            }
        }

        Machine {
            class,
            methods,
            heap: Vec::new(),
            output: Vec::new(),
            calls: Vec::new(),
        }
    }

    /// `new C; invokespecial C/<init>()V`
    pub fn instantiate(&mut self) -> Value {
        let obj = self.alloc(HeapObj::Object(FxHashMap::default()));
        self.invoke("<init>", Some(obj), Vec::new());
        obj
    }

    pub fn run_static(&mut self, name: &str, args: Vec<Value>) -> Option<Value> {
        self.invoke(name, None, args)
    }

    /// Call an instance method on a freshly constructed object.
    pub fn run_virtual(&mut self, name: &str, args: Vec<Value>) -> Option<Value> {
        let this = self.instantiate();
        self.invoke(name, Some(this), args)
    }

    fn alloc(&mut self, obj: HeapObj) -> Value {
        self.heap.push(obj);
        Value::Ref(self.heap.len() - 1)
    }

    fn array(&mut self, value: Value) -> &mut Vec<Value> {
        match value {
            Value::Ref(idx) => match &mut self.heap[idx] {
                HeapObj::Array(elems) => elems,
                HeapObj::Object(_) => panic!("not an array"),
            },
            other => panic!("expected array reference, found {other:?}"),
        }
    }

    fn object(&mut self, value: Value) -> &mut FxHashMap<String, Value> {
        match value {
            Value::Ref(idx) => match &mut self.heap[idx] {
                HeapObj::Object(fields) => fields,
                HeapObj::Array(_) => panic!("not an object"),
            },
            other => panic!("expected object reference, found {other:?}"),
        }
    }

    fn invoke(&mut self, name: &str, this: Option<Value>, args: Vec<Value>) -> Option<Value> {
        self.calls.push(format!("{}.{name}", self.class));
        let method = Rc::clone(
            self.methods
                .get(name)
                .unwrap_or_else(|| panic!("no method `{name}`")),
        );
        assert_eq!(method.is_static, this.is_none(), "receiver mismatch for `{name}`");

        let mut locals = vec![Value::Int(0); method.max_locals];
        for (slot, value) in this.into_iter().chain(args).enumerate() {
            assert!(slot < method.max_locals, "argument slot {slot} beyond .limit locals");
            locals[slot] = value;
        }

        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0;
        loop {
            let insn = method
                .code
                .get(pc)
                .unwrap_or_else(|| panic!("`{name}` ran past its last instruction"));
            pc += 1;
            let (op, arg) = (insn.op.as_str(), insn.arg.as_str());
            let jump = |taken: bool, pc: &mut usize| {
                if taken {
                    *pc = method.labels[arg];
                }
            };

            match op {
                "iconst_m1" => stack.push(Value::Int(-1)),
                _ if op.starts_with("iconst_") => {
                    stack.push(Value::Int(op["iconst_".len()..].parse().unwrap_or(0)));
                }
                "bipush" | "sipush" | "ldc" => stack.push(Value::Int(parse_int(arg))),
                _ if op.starts_with("iload") || op.starts_with("aload") => {
                    stack.push(locals[local_slot(op, arg)]);
                }
                _ if op.starts_with("istore") || op.starts_with("astore") => {
                    let value = pop(&mut stack);
                    locals[local_slot(op, arg)] = value;
                }
                "iadd" | "isub" | "imul" | "idiv" | "iand" | "ior" | "ixor" => {
                    let b = pop(&mut stack).int();
                    let a = pop(&mut stack).int();
                    stack.push(Value::Int(match op {
                        "iadd" => a.wrapping_add(b),
                        "isub" => a.wrapping_sub(b),
                        "imul" => a.wrapping_mul(b),
                        "idiv" => a.wrapping_div(b),
                        "iand" => a & b,
                        "ior" => a | b,
                        _ => a ^ b,
                    }));
                }
                _ if op.starts_with("if_icmp") => {
                    let b = pop(&mut stack).int();
                    let a = pop(&mut stack).int();
                    let taken = match &op["if_icmp".len()..] {
                        "lt" => a < b,
                        "le" => a <= b,
                        "gt" => a > b,
                        "ge" => a >= b,
                        "eq" => a == b,
                        "ne" => a != b,
                        other => panic!("unknown comparison {other}"),
                    };
                    jump(taken, &mut pc);
                }
                "if_acmpeq" | "if_acmpne" => {
                    let b = pop(&mut stack);
                    let a = pop(&mut stack);
                    jump((a == b) == (op == "if_acmpeq"), &mut pc);
                }
                "ifne" => {
                    let v = pop(&mut stack).int();
                    jump(v != 0, &mut pc);
                }
                "ifeq" => {
                    let v = pop(&mut stack).int();
                    jump(v == 0, &mut pc);
                }
                "goto" => jump(true, &mut pc),
                "newarray" | "anewarray" => {
                    let len = usize::try_from(pop(&mut stack).int())
                        .unwrap_or_else(|_| panic!("negative array size"));
                    let fill = if op == "newarray" { Value::Int(0) } else { Value::Null };
                    let arr = self.alloc(HeapObj::Array(vec![fill; len]));
                    stack.push(arr);
                }
                "iaload" | "baload" | "aaload" => {
                    let index = index(pop(&mut stack));
                    let arr = pop(&mut stack);
                    let value = self.array(arr)[index];
                    stack.push(value);
                }
                "iastore" | "bastore" | "aastore" => {
                    let value = pop(&mut stack);
                    let index = index(pop(&mut stack));
                    let arr = pop(&mut stack);
                    self.array(arr)[index] = value;
                }
                "arraylength" => {
                    let arr = pop(&mut stack);
                    let len = i32::try_from(self.array(arr).len()).unwrap_or(i32::MAX);
                    stack.push(Value::Int(len));
                }
                "new" => {
                    let obj = self.alloc(HeapObj::Object(FxHashMap::default()));
                    stack.push(obj);
                }
                "dup" => {
                    let top = *stack.last().unwrap_or_else(|| panic!("dup on empty stack"));
                    stack.push(top);
                }
                "pop" => {
                    pop(&mut stack);
                }
                "getfield" => {
                    let (field, desc) = field_operand(arg);
                    let obj = pop(&mut stack);
                    let value = self
                        .object(obj)
                        .get(field)
                        .copied()
                        .unwrap_or_else(|| default_for(desc));
                    stack.push(value);
                }
                "putfield" => {
                    let (field, _) = field_operand(arg);
                    let value = pop(&mut stack);
                    let obj = pop(&mut stack);
                    self.object(obj).insert(field.to_owned(), value);
                }
                "invokestatic" | "invokevirtual" | "invokespecial" | "invokeinterface" => {
                    let call = parse_invoke(arg);
                    let mut call_args: Vec<Value> =
                        (0..call.params).map(|_| pop(&mut stack)).collect();
                    call_args.reverse();
                    let receiver = (op != "invokestatic").then(|| pop(&mut stack));
                    let result = if call.owner == self.class {
                        self.invoke(&call.name, receiver, call_args)
                    } else if call.name == "<init>" {
                        None
                    } else if call.owner == "io" && matches!(call.name.as_str(), "println" | "print") {
                        self.output.extend(call_args.iter().map(|v| v.int()));
                        None
                    } else {
                        panic!("cannot run external call {arg}");
                    };
                    match (result, call.returns) {
                        (Some(value), true) => stack.push(value),
                        (None, false) => {}
                        (result, returns) => {
                            panic!("`{}` returned {result:?}, descriptor says returns={returns}", call.name)
                        }
                    }
                }
                "ireturn" | "areturn" => {
                    let value = pop(&mut stack);
                    assert!(stack.is_empty(), "`{name}` returned with {} extra values", stack.len());
                    return Some(value);
                }
                "return" => {
                    assert!(stack.is_empty(), "`{name}` returned with {} extra values", stack.len());
                    return None;
                }
                other => panic!("unsupported instruction {other}"),
            }

            assert!(
                stack.len() <= method.max_stack,
                "`{name}` exceeded .limit stack {} at {op}",
                method.max_stack
            );
        }
    }
}

struct Invoke {
    owner: String,
    name: String,
    params: usize,
    returns: bool,
}

/// `Owner/name(desc)ret [count]`
fn parse_invoke(arg: &str) -> Invoke {
    let target = arg.split_whitespace().next().unwrap_or_default();
    let (head, desc) = target
        .split_once('(')
        .unwrap_or_else(|| panic!("bad invoke operand {arg}"));
    let (owner, name) = head
        .rsplit_once('/')
        .unwrap_or_else(|| panic!("bad invoke operand {arg}"));
    let (params, ret) = desc
        .split_once(')')
        .unwrap_or_else(|| panic!("bad descriptor {desc}"));

    let mut count = 0;
    let mut chars = params.chars();
    while let Some(c) = chars.next() {
        match c {
            '[' => continue,
            'L' => {
                chars.by_ref().find(|&c| c == ';');
                count += 1;
            }
            _ => count += 1,
        }
    }

    Invoke {
        owner: owner.to_owned(),
        name: name.to_owned(),
        params: count,
        returns: ret != "V",
    }
}

/// `Owner/field Desc` → (field, desc)
fn field_operand(arg: &str) -> (&str, &str) {
    let (target, desc) = arg
        .split_once(' ')
        .unwrap_or_else(|| panic!("bad field operand {arg}"));
    let field = target.rsplit('/').next().unwrap_or(target);
    (field, desc)
}

fn default_for(desc: &str) -> Value {
    if desc == "I" || desc == "Z" {
        Value::Int(0)
    } else {
        Value::Null
    }
}

fn local_slot(op: &str, arg: &str) -> usize {
    match op.split_once('_') {
        Some((_, n)) => n.parse().unwrap_or_else(|_| panic!("bad slot in {op}")),
        None => arg.parse().unwrap_or_else(|_| panic!("bad slot operand {arg}")),
    }
}

fn parse_int(arg: &str) -> i32 {
    arg.parse().unwrap_or_else(|_| panic!("bad integer operand {arg}"))
}

fn index(value: Value) -> usize {
    usize::try_from(value.int()).unwrap_or_else(|_| panic!("negative index"))
}

fn pop(stack: &mut Vec<Value>) -> Value {
    stack.pop().unwrap_or_else(|| panic!("operand stack underflow"))
}
