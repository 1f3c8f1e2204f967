//! The stringification pass.
//!
//! Purely syntactic: walks the finished scope tree and renders source.
//! Expression printing is precedence-driven; a child is parenthesized
//! only when it binds weaker than its parent, or equally on the
//! non-associative side. Literal rendering honors the configuration: the
//! power-of-two hex heuristic, literal suffixes, trailing zeros, and the
//! division forms for NaN and the infinities.

use crate::{
    config::Config,
    op::{Associativity, OpArena, OpId, OpKind, prio},
    scope::{Item, ScopeArena, ScopeId, ScopeItem, ScopeKind},
    types::{IntegralRange, Primitive, Type, TypeStore, source_name},
    var::Locals,
};

const INDENT: &str = "    ";

/// Renders an integer constant, in hex when the configuration and the
/// round-binary-value heuristic say so.
pub fn int_literal(value: i64, cfg: &Config) -> String {
    let hex = |v: i64| {
        if v < 0 {
            format!("-0x{:X}", v.unsigned_abs())
        } else {
            format!("0x{v:X}")
        }
    };
    if cfg.use_hex_numbers_always {
        return hex(value);
    }
    if cfg.can_use_hex_numbers {
        let magnitude = value.unsigned_abs();
        let round = magnitude.is_power_of_two() || (magnitude + 1).is_power_of_two();
        if magnitude >= 16 && round {
            return hex(value);
        }
    }
    value.to_string()
}

/// Renders a `float` constant with the configured suffix policy.
pub fn float_literal(value: f32, cfg: &Config) -> String {
    let integral_postfix = if cfg.use_trailing_zero {
        format!(".0{}", cfg.float_postfix)
    } else {
        cfg.float_postfix.clone()
    };
    if value.is_nan() {
        return format!("(0{integral_postfix} / 0{integral_postfix})");
    }
    if value.is_infinite() {
        let sign = if value > 0.0 { "1" } else { "-1" };
        return format!("({sign}{integral_postfix} / 0{integral_postfix})");
    }
    let mut buffer = ryu::Buffer::new();
    let formatted = buffer.format(value);
    match formatted.strip_suffix(".0") {
        Some(base) => format!("{base}{integral_postfix}"),
        None => format!("{formatted}{}", cfg.float_postfix),
    }
}

/// Renders a `double` constant. The suffix only appears when configured;
/// an integral value keeps `.0` so the literal stays a double.
pub fn double_literal(value: f64, cfg: &Config) -> String {
    let integral_postfix = if cfg.use_double_postfix {
        if cfg.use_trailing_zero {
            format!(".0{}", cfg.double_postfix)
        } else {
            cfg.double_postfix.clone()
        }
    } else {
        ".0".to_owned()
    };
    if value.is_nan() {
        return format!("(0{integral_postfix} / 0{integral_postfix})");
    }
    if value.is_infinite() {
        let sign = if value > 0.0 { "1" } else { "-1" };
        return format!("({sign}{integral_postfix} / 0{integral_postfix})");
    }
    let mut buffer = ryu::Buffer::new();
    let formatted = buffer.format(value);
    match formatted.strip_suffix(".0") {
        Some(base) => format!("{base}{integral_postfix}"),
        None if cfg.use_double_postfix => format!("{formatted}{}", cfg.double_postfix),
        None => formatted.to_owned(),
    }
}

fn escape_char_into(out: &mut String, c: char, quote: char) {
    match c {
        '\n' => out.push_str("\\n"),
        '\t' => out.push_str("\\t"),
        '\r' => out.push_str("\\r"),
        '\x08' => out.push_str("\\b"),
        '\x0c' => out.push_str("\\f"),
        '\\' => out.push_str("\\\\"),
        c if c == quote => {
            out.push('\\');
            out.push(c);
        }
        c if (c as u32) < 0x20 || (c as u32) == 0x7f => {
            out.push_str(&format!("\\u{:04x}", c as u32));
        }
        c => out.push(c),
    }
}

/// Renders a `char` constant as a quoted literal.
pub fn char_literal(value: i64) -> String {
    let mut out = String::from("'");
    match u32::try_from(value).ok().and_then(char::from_u32) {
        Some(c) => escape_char_into(&mut out, c, '\''),
        None => out.push_str(&format!("\\u{:04x}", value & 0xffff)),
    }
    out.push('\'');
    out
}

/// Renders a string constant as a quoted Java literal.
pub fn string_literal(value: &str) -> String {
    let mut out = String::from("\"");
    for c in value.chars() {
        escape_char_into(&mut out, c, '"');
    }
    out.push('"');
    out
}

/// Type name used in declarations and casts; an unresolved interval
/// crystallizes to `boolean` when still possible, else to its widest
/// candidate.
fn decl_type_name(ty: Type, store: &TypeStore) -> String {
    match ty {
        Type::Integral(r) => r.reduced().name().to_owned(),
        other => source_name(other, store),
    }
}

fn interval_prints_as(r: IntegralRange) -> Primitive {
    r.reduced()
}

/// The scope-tree printer.
pub(crate) struct Printer<'a> {
    ops: &'a OpArena,
    scopes: &'a ScopeArena,
    locals: &'a Locals,
    store: &'a TypeStore,
    cfg: &'a Config,
    indent: usize,
}

impl<'a> Printer<'a> {
    pub fn new(
        ops: &'a OpArena,
        scopes: &'a ScopeArena,
        locals: &'a Locals,
        store: &'a TypeStore,
        cfg: &'a Config,
    ) -> Self {
        Self {
            ops,
            scopes,
            locals,
            store,
            cfg,
            indent: 0,
        }
    }

    /// Renders the body of the method scope, braces included.
    pub fn method_body(&mut self, root: ScopeId) -> String {
        self.braces(root)
    }

    fn pad(&self) -> String {
        INDENT.repeat(self.indent)
    }

    // === scopes ===

    fn scope_string(&mut self, id: ScopeId) -> String {
        let scope = self.scopes.get(id);
        match &scope.kind {
            ScopeKind::Method | ScopeKind::Block => self.braces(id),
            ScopeKind::If { condition, .. } => {
                let header = format!("if({}) ", self.expr(*condition));
                format!("{header}{}", self.braces(id))
            }
            ScopeKind::Else { .. } => self.else_string(id),
            ScopeKind::While { condition } => {
                let label = self.label_prefix(id);
                let header = format!("while({}) ", self.expr(*condition));
                format!("{label}{header}{}", self.braces(id))
            }
            ScopeKind::InfiniteLoop { condition } => {
                let label = self.label_prefix(id);
                let header = format!("while({}) ", self.expr(*condition));
                format!("{label}{header}{}", self.braces(id))
            }
            ScopeKind::EmptyInfiniteLoop => {
                format!("{}while(true) {{}}", self.label_prefix(id))
            }
            ScopeKind::Switch { .. } => self.switch_string(id),
            ScopeKind::Try => format!("try {}", self.braces(id)),
            ScopeKind::Catch { types, variable, .. } => {
                let names: Vec<String> = types.iter().map(|&t| source_name(t, self.store)).collect();
                format!(
                    " catch({} {}) {}",
                    names.join(" | "),
                    self.locals.name(*variable),
                    self.braces(id)
                )
            }
        }
    }

    fn label_prefix(&mut self, id: ScopeId) -> String {
        match self.scopes.get(id).label {
            Some(n) => format!("Label{n}: "),
            None => String::new(),
        }
    }

    /// `else` bodies holding exactly an `if` (or `if`/`else` pair) flatten
    /// into `else if` chains.
    fn else_string(&mut self, id: ScopeId) -> String {
        let code: Vec<ScopeItem> = self.visible_items(id);
        if code.len() == 1 {
            if let Item::Scope(inner) = code[0].item {
                if matches!(self.scopes.get(inner).kind, ScopeKind::If { .. }) {
                    return format!(" else {}", self.scope_string(inner));
                }
            }
        }
        if code.len() == 2 {
            if let (Item::Scope(first), Item::Scope(second)) = (code[0].item, code[1].item) {
                if matches!(self.scopes.get(first).kind, ScopeKind::If { .. })
                    && matches!(self.scopes.get(second).kind, ScopeKind::Else { .. })
                {
                    return format!(" else {}{}", self.scope_string(first), self.scope_string(second));
                }
            }
        }
        format!(" else {}", self.braces(id))
    }

    fn visible_items(&self, id: ScopeId) -> Vec<ScopeItem> {
        self.scopes
            .get(id)
            .code
            .iter()
            .filter(|entry| match entry.item {
                Item::Scope(s) => !self.scopes.get(s).removed,
                Item::Op(_) => true,
            })
            .copied()
            .collect()
    }

    /// A loop's trailing `continue` aimed at itself is implicit.
    fn printable_items(&self, id: ScopeId) -> Vec<ScopeItem> {
        let mut items = self.visible_items(id);
        if self.scopes.get(id).is_loop() {
            if let Some(last) = items.last() {
                if let Item::Op(op) = last.item {
                    if matches!(self.ops.kind(op), OpKind::Continue { target } if *target == id) {
                        items.pop();
                    }
                }
            }
        }
        items
    }

    fn braces(&mut self, id: ScopeId) -> String {
        let items = self.printable_items(id);
        if items.is_empty() {
            return "{}".to_owned();
        }
        let mut out = String::from("{\n");
        self.indent += 1;
        for entry in &items {
            self.push_item(&mut out, *entry);
        }
        self.indent -= 1;
        out.push_str(&self.pad());
        out.push('}');
        out
    }

    fn push_item(&mut self, out: &mut String, entry: ScopeItem) {
        match entry.item {
            Item::Scope(s) => {
                let rendered = self.scope_string(s);
                if rendered.starts_with(' ') {
                    // else / catch attach to the closing brace before them
                    while out.ends_with('\n') || out.ends_with(' ') {
                        out.pop();
                    }
                    out.push_str(&rendered);
                    out.push('\n');
                } else {
                    out.push_str(&self.pad());
                    out.push_str(&rendered);
                    out.push('\n');
                }
            }
            Item::Op(op) => {
                out.push_str(&self.pad());
                out.push_str(&self.expr(op));
                out.push_str(";\n");
            }
        }
    }

    fn switch_string(&mut self, id: ScopeId) -> String {
        let ScopeKind::Switch {
            value,
            default_index,
            cases,
        } = &self.scopes.get(id).kind
        else {
            unreachable!("switch_string on non-switch scope")
        };
        let value = *value;
        let default_index = *default_index;
        // default is checked before the case table at each position
        let mut labels: Vec<(usize, String)> = vec![(default_index, "default:".to_owned())];
        for (case_value, case_index) in cases {
            labels.push((*case_index, format!("case {}:", int_literal(i64::from(*case_value), self.cfg))));
        }

        let items = self.printable_items(id);
        let mut out = format!("switch({}) {{\n", self.expr(value));
        self.indent += 2;
        let mut emitted = vec![false; labels.len()];
        for entry in &items {
            for (i, (label_index, text)) in labels.iter().enumerate() {
                if !emitted[i] && *label_index <= entry.at {
                    emitted[i] = true;
                    out.push_str(&INDENT.repeat(self.indent - 1));
                    out.push_str(text);
                    out.push('\n');
                }
            }
            self.push_item(&mut out, *entry);
        }
        self.indent -= 2;
        out.push_str(&self.pad());
        out.push('}');
        out
    }

    // === expressions ===

    fn expr_prio(&mut self, id: OpId, parent: u8, side: Associativity) -> String {
        let child = self.ops.get(id).priority();
        let rendered = self.expr(id);
        let wrap = child < parent || (child == parent && side == Associativity::Right);
        if wrap { format!("({rendered})") } else { rendered }
    }

    fn expr(&mut self, id: OpId) -> String {
        let ty = self.ops.ty(id);
        let my_prio = self.ops.get(id).priority();
        match self.ops.kind(id).clone() {
            OpKind::IntConst(v) => match ty {
                Type::Primitive(Primitive::Boolean) => (v != 0).to_string(),
                Type::Primitive(Primitive::Char) => char_literal(i64::from(v)),
                Type::Integral(r) => match interval_prints_as(r) {
                    Primitive::Boolean => (v != 0).to_string(),
                    Primitive::Char => char_literal(i64::from(v)),
                    _ => int_literal(i64::from(v), self.cfg),
                },
                _ => int_literal(i64::from(v), self.cfg),
            },
            OpKind::LongConst(v) => format!("{}{}", int_literal(v, self.cfg), self.cfg.long_postfix),
            OpKind::FloatConst(v) => float_literal(v, self.cfg),
            OpKind::DoubleConst(v) => double_literal(v, self.cfg),
            OpKind::StringConst(s) => string_literal(&s),
            OpKind::ClassConst(t) => format!("{}.class", source_name(t, self.store)),
            OpKind::NullConst => "null".to_owned(),
            OpKind::TrueConst => "true".to_owned(),

            OpKind::Load(var) => self.locals.name(var).to_owned(),
            OpKind::Store { var, value, declare } => {
                let name = self.locals.name(var).to_owned();
                let value_str = self.expr(value);
                if declare {
                    let ty_name = decl_type_name(self.locals.get(var).ty, self.store);
                    format!("{ty_name} {name} = {value_str}")
                } else {
                    format!("{name} = {value_str}")
                }
            }
            OpKind::Inc { var, delta } => {
                let name = self.locals.name(var).to_owned();
                match delta {
                    1 => format!("{name}++"),
                    -1 => format!("{name}--"),
                    d if d < 0 => format!("{name} -= {}", -i32::from(d)),
                    d => format!("{name} += {d}"),
                }
            }

            OpKind::Binary { op, lhs, rhs } => {
                let l = self.expr_prio(lhs, my_prio, Associativity::Left);
                let r = self.expr_prio(rhs, my_prio, Associativity::Right);
                format!("{l} {} {r}", op.operator())
            }
            OpKind::Negate(operand) => format!("-{}", self.expr_prio(operand, prio::UNARY, Associativity::Right)),
            OpKind::Cast { value, target } => {
                format!(
                    "({}){}",
                    decl_type_name(target, self.store),
                    self.expr_prio(value, prio::UNARY, Associativity::Right)
                )
            }
            OpKind::InstanceOf { value, class } => {
                format!(
                    "{} instanceof {}",
                    self.expr_prio(value, my_prio, Associativity::Left),
                    source_name(class, self.store)
                )
            }
            OpKind::Cmp { lhs, rhs } => {
                // a cmp with no consuming branch; render the library form
                let wrapper = match self.ops.ty(lhs) {
                    Type::Primitive(Primitive::Long) => "Long",
                    Type::Primitive(Primitive::Float) => "Float",
                    Type::Primitive(Primitive::Double) => "Double",
                    _ => "Integer",
                };
                format!("{wrapper}.compare({}, {})", self.expr(lhs), self.expr(rhs))
            }

            OpKind::CompareBinary { kind, lhs, rhs, inverted } => {
                let l = self.expr_prio(lhs, my_prio, Associativity::Left);
                let r = self.expr_prio(rhs, my_prio, Associativity::Right);
                format!("{l} {} {r}", kind.rendered(inverted))
            }
            OpKind::CompareWithZero { kind, operand, inverted } => {
                if kind.is_equality() && self.ops.ty(operand).is_subtype_of(Type::BOOLEAN, self.store) {
                    // `!flag` over `flag == false`
                    format!(
                        "{}{}",
                        kind.unary_operator(inverted),
                        self.expr_prio(operand, prio::UNARY, Associativity::Right)
                    )
                } else {
                    format!(
                        "{} {} 0",
                        self.expr_prio(operand, my_prio, Associativity::Left),
                        kind.rendered(inverted)
                    )
                }
            }
            OpKind::CompareWithNull { kind, operand, inverted } => {
                format!("{} {} null", self.expr(operand), kind.rendered(inverted))
            }
            OpKind::And {
                lhs,
                rhs,
                inverted,
                condition_operands,
            } => {
                let l = self.expr_prio(lhs, my_prio, Associativity::Left);
                let r = self.expr_prio(rhs, my_prio, Associativity::Right);
                if inverted {
                    if condition_operands {
                        format!("{l} || {r}")
                    } else {
                        format!("!({l} && {r})")
                    }
                } else {
                    format!("{l} && {r}")
                }
            }
            OpKind::Or {
                lhs,
                rhs,
                inverted,
                condition_operands,
            } => {
                let l = self.expr_prio(lhs, my_prio, Associativity::Left);
                let r = self.expr_prio(rhs, my_prio, Associativity::Right);
                if inverted {
                    if condition_operands {
                        format!("{l} && {r}")
                    } else {
                        format!("!({l} || {r})")
                    }
                } else {
                    format!("{l} || {r}")
                }
            }
            OpKind::Ternary {
                condition,
                true_case,
                false_case,
            } => {
                format!(
                    "{} ? {} : {}",
                    self.expr_prio(condition, prio::TERNARY, Associativity::Left),
                    self.expr(true_case),
                    self.expr(false_case)
                )
            }

            OpKind::GetField { class, name, object } => match object {
                Some(object) => format!("{}.{name}", self.receiver(object)),
                None => format!("{}.{name}", source_name(class, self.store)),
            },
            OpKind::PutField {
                class,
                name,
                object,
                value,
            } => {
                let target = match object {
                    Some(object) => format!("{}.{name}", self.receiver(object)),
                    None => format!("{}.{name}", source_name(class, self.store)),
                };
                format!("{target} = {}", self.expr(value))
            }
            OpKind::ArrayLoad { array, index } => {
                format!(
                    "{}[{}]",
                    self.expr_prio(array, prio::POSTFIX, Associativity::Left),
                    self.expr(index)
                )
            }
            OpKind::ArrayStore { array, index, value } => {
                format!(
                    "{}[{}] = {}",
                    self.expr_prio(array, prio::POSTFIX, Associativity::Left),
                    self.expr(index),
                    self.expr(value)
                )
            }
            OpKind::ArrayLength(array) => {
                format!("{}.length", self.expr_prio(array, prio::POSTFIX, Associativity::Left))
            }
            OpKind::NewArray { length } => {
                let (member, nesting) = match ty {
                    Type::Array(array_id) => {
                        let array = self.store.array(array_id);
                        (array.member, array.nesting)
                    }
                    other => (other, 1),
                };
                format!(
                    "new {}[{}]{}",
                    source_name(member, self.store),
                    self.expr(length),
                    "[]".repeat(nesting as usize - 1)
                )
            }

            OpKind::New(class) => format!("new {}()", source_name(class, self.store)),
            OpKind::NewObject { class, args } => {
                let rendered: Vec<String> = args.iter().map(|&a| self.expr(a)).collect();
                format!("new {}({})", source_name(class, self.store), rendered.join(", "))
            }
            OpKind::Invoke {
                class,
                name,
                object,
                args,
                ..
            } => {
                let rendered: Vec<String> = args.iter().map(|&a| self.expr(a)).collect();
                let rendered = rendered.join(", ");
                if name == "<init>" {
                    return format!("super({rendered})");
                }
                match object {
                    None => format!("{}.{name}({rendered})", source_name(class, self.store)),
                    Some(object) => {
                        let receiver = self.receiver(object);
                        if receiver == "this" {
                            format!("{name}({rendered})")
                        } else {
                            format!("{receiver}.{name}({rendered})")
                        }
                    }
                }
            }

            OpKind::Return(value) => match value {
                Some(value) => format!("return {}", self.expr(value)),
                None => "return".to_owned(),
            },
            OpKind::Throw(exception) => format!("throw {}", self.expr(exception)),
            OpKind::Break { target } => match self.scopes.get(target).label {
                Some(n) => format!("break Label{n}"),
                None => "break".to_owned(),
            },
            OpKind::Continue { target } => match self.scopes.get(target).label {
                Some(n) => format!("continue Label{n}"),
                None => "continue".to_owned(),
            },
            OpKind::Unknown => "null".to_owned(),
        }
    }

    fn receiver(&mut self, object: OpId) -> String {
        self.expr_prio(object, prio::POSTFIX, Associativity::Left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        Config::default()
    }

    #[test]
    fn test_int_literal_hex_heuristic() {
        let cfg = cfg();
        assert_eq!(int_literal(5, &cfg), "5");
        assert_eq!(int_literal(16, &cfg), "0x10");
        assert_eq!(int_literal(255, &cfg), "0xFF");
        assert_eq!(int_literal(100, &cfg), "100");
        assert_eq!(int_literal(-32, &cfg), "-0x20");
        assert_eq!(int_literal(15, &cfg), "15");
    }

    #[test]
    fn test_int_literal_always_hex() {
        let cfg = Config {
            use_hex_numbers_always: true,
            ..Config::default()
        };
        assert_eq!(int_literal(5, &cfg), "0x5");
    }

    #[test]
    fn test_int_literal_heuristic_disabled() {
        let cfg = Config {
            can_use_hex_numbers: false,
            ..Config::default()
        };
        assert_eq!(int_literal(256, &cfg), "256");
    }

    #[test]
    fn test_float_literals() {
        let cfg = cfg();
        assert_eq!(float_literal(1.0, &cfg), "1.0f");
        assert_eq!(float_literal(1.5, &cfg), "1.5f");
        assert_eq!(float_literal(f32::NAN, &cfg), "(0.0f / 0.0f)");
        assert_eq!(float_literal(f32::INFINITY, &cfg), "(1.0f / 0.0f)");
        assert_eq!(float_literal(f32::NEG_INFINITY, &cfg), "(-1.0f / 0.0f)");
    }

    #[test]
    fn test_float_literal_without_trailing_zero() {
        let cfg = Config {
            use_trailing_zero: false,
            ..Config::default()
        };
        assert_eq!(float_literal(2.0, &cfg), "2f");
    }

    #[test]
    fn test_double_literals() {
        let cfg = cfg();
        assert_eq!(double_literal(1.0, &cfg), "1.0");
        assert_eq!(double_literal(2.5, &cfg), "2.5");
        assert_eq!(double_literal(f64::NAN, &cfg), "(0.0 / 0.0)");
        let with_postfix = Config {
            use_double_postfix: true,
            ..Config::default()
        };
        assert_eq!(double_literal(2.5, &with_postfix), "2.5d");
        assert_eq!(double_literal(1.0, &with_postfix), "1.0d");
    }

    #[test]
    fn test_char_and_string_literals() {
        assert_eq!(char_literal(i64::from(b'a')), "'a'");
        assert_eq!(char_literal(i64::from(b'\n')), "'\\n'");
        assert_eq!(char_literal(39), "'\\''");
        assert_eq!(string_literal("a\"b\n"), "\"a\\\"b\\n\"");
    }
}
