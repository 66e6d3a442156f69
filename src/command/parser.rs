//! Token parsing for command parameter tables, backed by clap's builder API.
//!
//! Each descriptor owns one `clap::Command` built from its parameter table.
//! clap does flag lookup, arity, required checks, value conversion, help and
//! diagnostics; this module only adds the trailing-text rule and converts
//! matches (or pattern captures) into bound `Value`s.

use std::collections::HashMap;

use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches, Command};

use super::param::{Arity, ParamKind, ParameterSpec, TypeHint, Value};

/// Result of parsing one token list.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(HashMap<String, Value>),
    /// `-h`/`--help` was given; carries the help text.
    Help(String),
    /// Diagnostic plus usage, ready to show to the user.
    Failed(String),
}

/// Split raw input with shell quoting rules.
pub fn tokenize(input: &str) -> Result<Vec<String>, String> {
    shell_words::split(input).map_err(|e| e.to_string())
}

/// Parser over one command's parameter table.
#[derive(Clone, Debug)]
pub struct Parser {
    command: Command,
    params: Vec<ParameterSpec>,
    /// Trailing string positional that takes the rest of the line.
    absorbing: Option<String>,
}

impl Parser {
    pub fn new(prog: &str, description: Option<&str>, params: &[ParameterSpec]) -> Self {
        let absorbing = absorbing_positional(params);

        let mut command = Command::new(prog.to_string())
            .no_binary_name(true)
            .disable_version_flag(true);
        if let Some(description) = description {
            command = command.about(description.to_string());
        }
        for spec in params {
            let absorbs = absorbing.as_deref() == Some(spec.name.as_str());
            command = command.arg(clap_arg(spec, absorbs));
        }

        Self {
            command,
            params: params.to_vec(),
            absorbing,
        }
    }

    pub fn parse(&self, tokens: &[String]) -> ParseOutcome {
        let matches = match self
            .command
            .clone()
            .try_get_matches_from(tokens.iter().map(String::as_str))
        {
            Ok(matches) => matches,
            Err(err) if err.kind() == ErrorKind::DisplayHelp => {
                return ParseOutcome::Help(err.render().to_string().trim().to_string());
            }
            Err(err) => return ParseOutcome::Failed(err.render().to_string().trim().to_string()),
        };

        match self.collect(&matches) {
            Ok(values) => ParseOutcome::Parsed(values),
            Err(detail) => ParseOutcome::Failed(detail),
        }
    }

    /// Full help text, as `-h` would print it.
    pub fn help(&self) -> String {
        self.command.clone().render_help().to_string().trim().to_string()
    }

    fn collect(&self, matches: &ArgMatches) -> Result<HashMap<String, Value>, String> {
        let mut values = HashMap::new();
        for spec in &self.params {
            let id = spec.name.as_str();
            let value = if spec.arity == Arity::Switch {
                matches
                    .try_get_one::<bool>(id)
                    .map_err(|e| e.to_string())?
                    .map(|flag| Value::Bool(*flag))
            } else if spec.arity.is_multi() {
                matches
                    .try_get_many::<Value>(id)
                    .map_err(|e| e.to_string())?
                    .map(|items| Value::List(items.cloned().collect()))
            } else if self.absorbing.as_deref() == Some(id) {
                matches
                    .try_get_many::<Value>(id)
                    .map_err(|e| e.to_string())?
                    .map(|items| {
                        let words: Vec<String> = items.map(Value::to_string).collect();
                        Value::Str(words.join(" "))
                    })
            } else {
                matches
                    .try_get_one::<Value>(id)
                    .map_err(|e| e.to_string())?
                    .cloned()
            };

            if let Some(value) = value.or_else(|| spec.default.clone()) {
                values.insert(spec.name.clone(), value);
            }
        }
        Ok(values)
    }
}

/// The last positional absorbs surplus words when it is a plain single
/// string and no other positional already collects a list.
fn absorbing_positional(params: &[ParameterSpec]) -> Option<String> {
    let positionals: Vec<&ParameterSpec> = params
        .iter()
        .filter(|p| p.kind == ParamKind::Positional)
        .collect();
    if positionals.iter().any(|p| p.arity.is_multi()) {
        return None;
    }
    positionals
        .last()
        .filter(|p| p.absorbs_rest())
        .map(|p| p.name.clone())
}

fn clap_arg(spec: &ParameterSpec, absorbs: bool) -> Arg {
    let mut arg = Arg::new(spec.name.clone());
    if let Some(help) = &spec.help {
        arg = arg.help(help.clone());
    }

    if spec.kind == ParamKind::Optional {
        let mut longs = spec.long.iter();
        if let Some(first) = longs.next() {
            arg = arg.long(first.clone());
        }
        for alias in longs {
            arg = arg.visible_alias(alias.clone());
        }
        if let Some(short) = spec.short {
            arg = arg.short(short);
        }
        if spec.arity == Arity::Switch {
            return arg.action(ArgAction::SetTrue);
        }
    }

    arg = arg
        .action(ArgAction::Set)
        .required(spec.required)
        .value_name(spec.metavar())
        .allow_negative_numbers(true)
        .value_parser(token_parser(spec));

    arg = match (spec.kind, spec.arity) {
        (_, Arity::OneOrMore) => arg.num_args(1..),
        (ParamKind::Optional, Arity::ZeroOrMore) => arg.num_args(0..),
        (ParamKind::Optional, Arity::Optional) => arg.num_args(0..=1),
        // A positional cannot take zero values; leaving it out covers that.
        (ParamKind::Positional, Arity::ZeroOrMore) => arg.num_args(1..),
        _ if absorbs => arg.num_args(1..),
        _ => arg.num_args(1),
    };

    match &spec.default {
        Some(Value::List(_)) | None => arg,
        Some(default) => arg.default_value(default.to_string()),
    }
}

/// Converts one token into a `Value` through the type hint; choices are
/// checked by clap so they show up in help and diagnostics.
fn token_parser(spec: &ParameterSpec) -> clap::builder::ValueParser {
    let hint = spec.hint.unwrap_or(TypeHint::Str);
    if spec.choices.is_empty() {
        clap::builder::ValueParser::new(move |raw: &str| hint.coerce(raw))
    } else {
        let choices = PossibleValuesParser::new(spec.choices.clone());
        clap::builder::ValueParser::new(choices.try_map(move |raw: String| hint.coerce(&raw)))
    }
}

/// Bind named capture groups from a pattern match to the parameter table.
pub fn bind_captures(
    params: &[ParameterSpec],
    captures: &HashMap<String, String>,
) -> Result<HashMap<String, Value>, String> {
    let mut values = HashMap::new();
    let mut missing = Vec::new();
    for spec in params {
        match captures.get(&spec.name) {
            Some(raw) if spec.arity.is_multi() => {
                let parts: Vec<String> = raw.split_whitespace().map(String::from).collect();
                values.insert(spec.name.clone(), coerce_all(spec, &parts)?);
            }
            Some(raw) if spec.arity == Arity::Switch => {
                values.insert(spec.name.clone(), Value::Bool(!raw.is_empty()));
            }
            Some(raw) => {
                values.insert(spec.name.clone(), spec.coerce(raw)?);
            }
            None => match &spec.default {
                Some(default) => {
                    values.insert(spec.name.clone(), default.clone());
                }
                None if spec.required => missing.push(spec.display_name()),
                None => {}
            },
        }
    }

    if !missing.is_empty() {
        return Err(format!(
            "the following arguments are required: {}",
            missing.join(", ")
        ));
    }
    Ok(values)
}

fn coerce_all(spec: &ParameterSpec, raw: &[String]) -> Result<Value, String> {
    let items = raw
        .iter()
        .map(|token| spec.coerce(token))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::List(items))
}
