//! Argument binder: turns declared parameters plus registration hints into a
//! validated parameter table and resolves the injection slots.

use std::collections::HashSet;

use super::param::{ArgHint, Arity, Param, ParamKind, ParameterSpec, TypeHint};
use crate::error::{Error, Result};

/// Parameter names a handler asked to have injected.
#[derive(Clone, Debug, Default)]
pub struct SlotNames {
    pub context: Option<String>,
    pub identity: Option<String>,
    pub text: Option<String>,
}

/// Output of the binder.
#[derive(Clone, Debug, Default)]
pub struct Signature {
    pub params: Vec<ParameterSpec>,
    pub context: Option<String>,
    pub identity: Option<String>,
    pub text: Option<String>,
    pub warnings: Vec<String>,
}

impl Signature {
    pub fn injects_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn injects_identity(&self) -> bool {
        self.identity.is_some()
    }

    pub fn injects_text(&self) -> bool {
        self.text.is_some()
    }

    fn is_slot(&self, name: &str) -> bool {
        [&self.context, &self.identity, &self.text]
            .into_iter()
            .any(|slot| slot.as_deref() == Some(name))
    }
}

/// Build the parameter table for `command`.
///
/// Slot problems are downgraded to warnings; malformed hints and name
/// clashes fail registration of this one command.
pub fn bind(
    command: &str,
    declared: &[Param],
    hints: &[ArgHint],
    slots: &SlotNames,
) -> Result<Signature> {
    let mut sig = Signature::default();

    sig.context = resolve_slot(command, "context", &slots.context, declared, TypeHint::Context, &mut sig.warnings);
    sig.identity = resolve_slot(command, "identity", &slots.identity, declared, TypeHint::Identity, &mut sig.warnings);
    sig.text = resolve_slot(command, "text", &slots.text, declared, TypeHint::Str, &mut sig.warnings);

    for hint in hints {
        if hint.dest.trim().is_empty() {
            return Err(Error::Registration(format!(
                "command '{}': argument hint is missing its dest",
                command
            )));
        }
    }

    for param in declared {
        if sig.is_slot(&param.name) {
            continue;
        }
        if matches!(param.hint, Some(TypeHint::Context) | Some(TypeHint::Identity)) {
            return Err(Error::Registration(format!(
                "command '{}': parameter '{}' of type {} is not an injection slot",
                command,
                param.name,
                param.hint.map(|h| h.label()).unwrap_or_default()
            )));
        }
        let spec = match hints.iter().rev().find(|h| h.dest == param.name) {
            Some(hint) => from_hint(hint, Some(param)),
            None => {
                tracing::debug!("command '{}': default positional for '{}'", command, param.name);
                unhinted(param)
            }
        };
        sig.params.push(spec);
    }

    // Hints naming a dest the handler never declared still bind, as plain strings.
    let mut seen: HashSet<&str> = declared.iter().map(|p| p.name.as_str()).collect();
    for hint in hints {
        if sig.is_slot(&hint.dest) {
            tracing::info!("command '{}': slot '{}' does not generate arguments", command, hint.dest);
            continue;
        }
        if seen.insert(hint.dest.as_str()) {
            let latest = hints.iter().rev().find(|h| h.dest == hint.dest).unwrap_or(hint);
            sig.params.push(from_hint(latest, None));
        }
    }

    check_unique(command, &sig.params)?;
    check_positionals(command, &sig.params)?;

    for warning in &sig.warnings {
        tracing::warn!("{}", warning);
    }

    Ok(sig)
}

fn resolve_slot(
    command: &str,
    slot: &str,
    requested: &Option<String>,
    declared: &[Param],
    expected: TypeHint,
    warnings: &mut Vec<String>,
) -> Option<String> {
    let name = requested.as_ref()?;
    let Some(param) = declared.iter().find(|p| &p.name == name) else {
        warnings.push(format!(
            "command '{}': missing {} parameter '{}', injection disabled",
            command, slot, name
        ));
        return None;
    };
    match param.hint {
        Some(hint) if hint != expected => {
            warnings.push(format!(
                "command '{}': {} parameter '{}' has type {}, expected {}; injection disabled",
                command,
                slot,
                name,
                hint.label(),
                expected.label()
            ));
            None
        }
        _ => Some(name.clone()),
    }
}

fn from_hint(hint: &ArgHint, declared: Option<&Param>) -> ParameterSpec {
    let default = declared.and_then(|p| p.default.clone());
    let type_hint = declared.and_then(|p| p.hint);

    let mut arity = hint.arity.unwrap_or(Arity::One);
    let mut default = default;
    let required;
    match hint.kind {
        ParamKind::Positional => {
            // A default relaxes a positional to zero-or-one tokens.
            if default.is_some() && arity == Arity::One {
                arity = Arity::Optional;
            }
            required = default.is_none() && arity.min() > 0;
        }
        ParamKind::Optional => {
            if arity == Arity::Switch && default.is_none() {
                default = Some(false.into());
            }
            // Optionals without a default must be supplied.
            required = default.is_none();
        }
    }

    let (long, short, display) = match hint.kind {
        ParamKind::Positional => (Vec::new(), None, hint.name.clone()),
        ParamKind::Optional => {
            let long = vec![hint.name.clone().unwrap_or_else(|| hint.dest.clone())];
            (long, hint.short, None)
        }
    };

    ParameterSpec {
        name: hint.dest.clone(),
        kind: hint.kind,
        required,
        default,
        hint: type_hint,
        long,
        short,
        arity,
        choices: hint.choices.clone(),
        help: hint.help.clone(),
        display,
    }
}

fn unhinted(param: &Param) -> ParameterSpec {
    let arity = if param.default.is_some() {
        Arity::Optional
    } else {
        Arity::One
    };
    ParameterSpec {
        name: param.name.clone(),
        kind: ParamKind::Positional,
        required: param.default.is_none(),
        default: param.default.clone(),
        hint: param.hint,
        long: Vec::new(),
        short: None,
        arity,
        choices: Vec::new(),
        help: None,
        display: None,
    }
}

fn check_unique(command: &str, params: &[ParameterSpec]) -> Result<()> {
    let mut names = HashSet::new();
    let mut flags = HashSet::new();
    for spec in params {
        if spec.name == "help" || !names.insert(spec.name.as_str()) {
            return Err(Error::Registration(format!(
                "command '{}': duplicate parameter '{}'",
                command, spec.name
            )));
        }
        for flag in spec.flag_names() {
            if flag == "-h" || flag == "--help" || !flags.insert(flag.clone()) {
                return Err(Error::Registration(format!(
                    "command '{}': conflicting option string '{}'",
                    command, flag
                )));
            }
        }
    }
    Ok(())
}

/// Positional layouts the parser can resolve without guessing: required
/// ones first, and at most one list, which must be last or directly before
/// a required final positional.
fn check_positionals(command: &str, params: &[ParameterSpec]) -> Result<()> {
    let positionals: Vec<&ParameterSpec> = params
        .iter()
        .filter(|p| p.kind == ParamKind::Positional)
        .collect();
    let invalid = |detail: String| Error::Registration(format!("command '{}': {}", command, detail));

    if let Some(switch) = positionals.iter().find(|p| p.arity == Arity::Switch) {
        return Err(invalid(format!("positional '{}' cannot be a switch", switch.name)));
    }

    if let Some(pos) = positionals.iter().position(|p| !p.required) {
        if let Some(later) = positionals[pos..].iter().find(|p| p.required) {
            return Err(invalid(format!(
                "required positional '{}' follows optional '{}'",
                later.name, positionals[pos].name
            )));
        }
    }

    let lists: Vec<usize> = positionals
        .iter()
        .enumerate()
        .filter(|(_, p)| p.arity.is_multi())
        .map(|(idx, _)| idx)
        .collect();
    if lists.len() > 1 {
        return Err(invalid("only one positional may take a list".to_string()));
    }
    if let Some(&idx) = lists.first() {
        let last = positionals.len() - 1;
        let ok = idx == last || (idx + 1 == last && positionals[last].required);
        if !ok {
            return Err(invalid(format!(
                "list positional '{}' must be last or followed by one required positional",
                positionals[idx].name
            )));
        }
    }
    Ok(())
}
