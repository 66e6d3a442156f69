//! Parameter model: declared handler parameters, registration hints and the
//! compiled parameter table.

use std::fmt;

/// A bound argument value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(" "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Declared type of a handler parameter.
///
/// The scalar hints drive token coercion; `Context` and `Identity` only mark
/// injection slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeHint {
    Str,
    Int,
    Float,
    Bool,
    Context,
    Identity,
}

impl TypeHint {
    pub fn label(&self) -> &'static str {
        match self {
            TypeHint::Str => "str",
            TypeHint::Int => "int",
            TypeHint::Float => "float",
            TypeHint::Bool => "bool",
            TypeHint::Context => "context",
            TypeHint::Identity => "identity",
        }
    }

    /// Coerce a raw token. The error is the diagnostic detail shown to users.
    pub fn coerce(&self, token: &str) -> Result<Value, String> {
        match self {
            TypeHint::Str => Ok(Value::Str(token.to_string())),
            TypeHint::Int => token
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("invalid int value: '{}'", token)),
            TypeHint::Float => token
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| format!("invalid float value: '{}'", token)),
            TypeHint::Bool => match token.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("invalid bool value: '{}'", token)),
            },
            TypeHint::Context | TypeHint::Identity => {
                Err(format!("{} values cannot be parsed from text", self.label()))
            }
        }
    }
}

/// A parameter as the handler declares it.
#[derive(Clone, Debug)]
pub struct Param {
    pub name: String,
    pub hint: Option<TypeHint>,
    pub default: Option<Value>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hint: None,
            default: None,
        }
    }

    pub fn hint(mut self, hint: TypeHint) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Whether a parameter is filled by position or by flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Positional,
    Optional,
}

/// How many tokens a parameter consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    One,
    /// Zero or one token.
    Optional,
    OneOrMore,
    ZeroOrMore,
    /// Flag without a value; presence binds `true`.
    Switch,
}

impl Arity {
    pub fn min(&self) -> usize {
        match self {
            Arity::One | Arity::OneOrMore => 1,
            Arity::Optional | Arity::ZeroOrMore | Arity::Switch => 0,
        }
    }

    pub fn max(&self) -> usize {
        match self {
            Arity::One | Arity::Optional => 1,
            Arity::OneOrMore | Arity::ZeroOrMore => usize::MAX,
            Arity::Switch => 0,
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, Arity::OneOrMore | Arity::ZeroOrMore)
    }
}

/// Registration-time hint for one parameter, keyed by `dest`.
#[derive(Clone, Debug)]
pub struct ArgHint {
    pub dest: String,
    pub kind: ParamKind,
    /// Display name for positionals, long flag (without dashes) for optionals.
    pub name: Option<String>,
    pub short: Option<char>,
    pub arity: Option<Arity>,
    pub choices: Vec<String>,
    pub help: Option<String>,
}

impl ArgHint {
    pub fn positional(dest: impl Into<String>) -> Self {
        Self {
            dest: dest.into(),
            kind: ParamKind::Positional,
            name: None,
            short: None,
            arity: None,
            choices: Vec::new(),
            help: None,
        }
    }

    pub fn optional(dest: impl Into<String>) -> Self {
        Self {
            kind: ParamKind::Optional,
            ..Self::positional(dest)
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn arity(mut self, arity: Arity) -> Self {
        self.arity = Some(arity);
        self
    }

    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

/// One compiled, bindable parameter.
#[derive(Clone, Debug)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
    pub hint: Option<TypeHint>,
    /// Long flag names without the leading `--`.
    pub long: Vec<String>,
    pub short: Option<char>,
    pub arity: Arity,
    pub choices: Vec<String>,
    pub help: Option<String>,
    /// Positional display name; defaults to `name`.
    pub display: Option<String>,
}

impl ParameterSpec {
    /// Name shown in usage and diagnostics: `--flag` for optionals.
    pub fn display_name(&self) -> String {
        match self.kind {
            ParamKind::Positional => self.display.clone().unwrap_or_else(|| self.name.clone()),
            ParamKind::Optional => match (self.long.first(), self.short) {
                (Some(long), _) => format!("--{}", long),
                (None, Some(short)) => format!("-{}", short),
                (None, None) => format!("--{}", self.name),
            },
        }
    }

    /// Flag spellings, short first, e.g. `-n, --times`.
    pub fn flag_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(short) = self.short {
            names.push(format!("-{}", short));
        }
        names.extend(self.long.iter().map(|l| format!("--{}", l)));
        names
    }

    pub fn metavar(&self) -> String {
        match self.kind {
            ParamKind::Positional => self.display_name(),
            ParamKind::Optional => self.name.to_uppercase(),
        }
    }

    /// Coerce a token through the type hint and choices.
    pub fn coerce(&self, token: &str) -> Result<Value, String> {
        let value = match self.hint {
            Some(hint) => hint.coerce(token),
            None => Ok(Value::Str(token.to_string())),
        }
        .map_err(|e| format!("argument {}: {}", self.display_name(), e))?;

        if !self.choices.is_empty() && !self.choices.iter().any(|c| c == token) {
            let allowed: Vec<String> = self.choices.iter().map(|c| format!("'{}'", c)).collect();
            return Err(format!(
                "argument {}: invalid choice: '{}' (choose from {})",
                self.display_name(),
                token,
                allowed.join(", ")
            ));
        }
        Ok(value)
    }

    /// Whether the trailing-positional rule may fold surplus words into this spec.
    pub(crate) fn absorbs_rest(&self) -> bool {
        self.kind == ParamKind::Positional
            && matches!(self.arity, Arity::One | Arity::Optional)
            && matches!(self.hint, None | Some(TypeHint::Str))
            && self.choices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_coercion() {
        assert_eq!(TypeHint::Int.coerce("42"), Ok(Value::Int(42)));
        assert!(TypeHint::Int.coerce("four").unwrap_err().contains("invalid int value"));
    }

    #[test]
    fn test_bool_coercion() {
        assert_eq!(TypeHint::Bool.coerce("Yes"), Ok(Value::Bool(true)));
        assert_eq!(TypeHint::Bool.coerce("off"), Ok(Value::Bool(false)));
        assert!(TypeHint::Bool.coerce("maybe").is_err());
    }

    #[test]
    fn test_display_names() {
        let spec = ParameterSpec {
            name: "times".to_string(),
            kind: ParamKind::Optional,
            required: true,
            default: None,
            hint: Some(TypeHint::Int),
            long: vec!["times".to_string()],
            short: Some('n'),
            arity: Arity::One,
            choices: Vec::new(),
            help: None,
            display: None,
        };
        assert_eq!(spec.display_name(), "--times");
        assert_eq!(spec.flag_names(), vec!["-n", "--times"]);
        assert_eq!(spec.metavar(), "TIMES");
    }

    #[test]
    fn test_choice_rejected() {
        let spec = ParameterSpec {
            name: "mode".to_string(),
            kind: ParamKind::Positional,
            required: true,
            default: None,
            hint: None,
            long: Vec::new(),
            short: None,
            arity: Arity::One,
            choices: vec!["on".to_string(), "off".to_string()],
            help: None,
            display: None,
        };
        let err = spec.coerce("maybe").unwrap_err();
        assert!(err.contains("invalid choice"));
        assert!(err.contains("'on', 'off'"));
    }
}
