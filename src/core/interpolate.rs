//! printf-style interpolation and caller-input normalization

use super::error::{LoggerError, Result};
use super::levels::LevelRegistry;
use super::record::{Arg, ErrorInfo, LogInput, Record, RESERVED_KEYS};
use serde_json::{Map, Value};

/// Result of scanning a message for placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolated {
    pub message: String,
    /// Arguments no placeholder consumed, in call order.
    pub leftovers: Vec<Arg>,
}

/// Substitute `%s %d %i %f %j %o %O` with positional arguments.
///
/// With no arguments the message is returned untouched (`%%` included).
/// Placeholders beyond the supplied arguments stay verbatim.
pub fn interpolate(message: &str, args: Vec<Arg>) -> Interpolated {
    if args.is_empty() {
        return Interpolated {
            message: message.to_string(),
            leftovers: args,
        };
    }

    let mut args = args.into_iter().peekable();
    let mut out = String::with_capacity(message.len() + 16);
    let mut chars = message.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(&next) = chars.peek() else {
            out.push('%');
            break;
        };
        match next {
            '%' => {
                chars.next();
                out.push('%');
            }
            's' | 'd' | 'i' | 'f' | 'j' | 'o' | 'O' => {
                chars.next();
                match args.next() {
                    Some(arg) => out.push_str(&render_placeholder(next, &arg)),
                    None => {
                        out.push('%');
                        out.push(next);
                    }
                }
            }
            _ => out.push('%'),
        }
    }

    Interpolated {
        message: out,
        leftovers: args.collect(),
    }
}

/// Count the argument-consuming placeholders in `message`.
pub fn placeholder_count(message: &str) -> usize {
    let mut count = 0;
    let mut chars = message.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.next() {
                Some('s' | 'd' | 'i' | 'f' | 'j' | 'o' | 'O') => count += 1,
                _ => {}
            }
        }
    }
    count
}

fn render_placeholder(kind: char, arg: &Arg) -> String {
    match kind {
        's' => match arg {
            Arg::Value(Value::String(s)) => s.clone(),
            Arg::Value(v) => v.to_string(),
            Arg::Error(e) => e.message.clone(),
        },
        'd' | 'i' | 'f' => {
            if let Some(exact) = exact_integer(arg) {
                return exact;
            }
            let number = as_number(arg);
            let number = if kind == 'i' { number.trunc() } else { number };
            format_number(number)
        }
        _ => match arg {
            Arg::Value(v) => safe_json(v),
            Arg::Error(e) => safe_json(&e.properties_value()),
        },
    }
}

/// Integers carried exactly by the argument, rendered without a float trip.
fn exact_integer(arg: &Arg) -> Option<String> {
    match arg {
        Arg::Value(Value::Number(n)) => n
            .as_i64()
            .map(|i| i.to_string())
            .or_else(|| n.as_u64().map(|u| u.to_string())),
        _ => None,
    }
}

fn as_number(arg: &Arg) -> f64 {
    match arg {
        Arg::Value(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Arg::Value(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        Arg::Value(Value::Bool(b)) => f64::from(u8::from(*b)),
        Arg::Value(Value::Null) => 0.0,
        _ => f64::NAN,
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

/// Serialize a value for `%j`, falling back to a marker on failure.
pub fn safe_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"[Unserializable]\"".to_string())
}

/// Merge arguments left over after interpolation into a record.
///
/// Objects merge key by key (a `message` key is appended to the message),
/// errors merge their properties and fill an empty message, everything else
/// is appended to the message separated by a space.
pub fn merge_leftovers(record: &mut Record, leftovers: Vec<Arg>) {
    for arg in leftovers {
        match arg {
            Arg::Value(Value::Object(object)) => merge_object(record, object),
            Arg::Error(error) => merge_error(record, error),
            Arg::Value(Value::String(s)) => append_message(record, &s),
            Arg::Value(other) => append_message(record, &other.to_string()),
        }
    }
}

fn merge_object(record: &mut Record, object: Map<String, Value>) {
    for (key, value) in object {
        match key.as_str() {
            "message" => {
                let text = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                append_message(record, &text);
            }
            "level" => {}
            _ => {
                record.metadata.insert(key, value);
            }
        }
    }
}

fn merge_error(record: &mut Record, error: ErrorInfo) {
    for (key, value) in &error.properties {
        if !RESERVED_KEYS.contains(&key.as_str()) {
            record.metadata.insert(key.clone(), value.clone());
        }
    }
    if record.message.is_empty() {
        record.message = error.message.clone();
    }
    record.error = Some(error);
}

fn append_message(record: &mut Record, text: &str) {
    if record.message.is_empty() {
        record.message = text.to_string();
    } else {
        record.message.push(' ');
        record.message.push_str(text);
    }
}

/// Turn caller input into a canonical record.
///
/// Fails only when the level is missing, not a string, or unknown.
pub fn normalize(input: LogInput, levels: &LevelRegistry) -> Result<Record> {
    let record = match input {
        LogInput::Message {
            level,
            message,
            args,
        } => {
            let Interpolated { message, leftovers } = interpolate(&message, args);
            let mut record = Record::new(level, message);
            merge_leftovers(&mut record, leftovers);
            record
        }
        LogInput::Object(mut object) => {
            let level = match object.remove("level") {
                Some(Value::String(level)) => level,
                Some(other) => {
                    return Err(LoggerError::invalid_level(format!(
                        "expected a string level, got {}",
                        other
                    )))
                }
                None => return Err(LoggerError::invalid_level("record has no level")),
            };
            let message = match object.remove("message") {
                Some(Value::String(message)) => message,
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            let mut record = Record::new(level, message);
            record.metadata = object;
            record
        }
        LogInput::Error { level, error } => {
            let mut record = Record::new(level, String::new());
            merge_error(&mut record, error);
            record
        }
        LogInput::Record(record) => record,
    };

    if record.level.is_empty() {
        return Err(LoggerError::invalid_level("record has no level"));
    }
    if !levels.contains(&record.level) {
        return Err(LoggerError::invalid_level(format!(
            "'{}' is not a configured level",
            record.level
        )));
    }

    Ok(record)
}
