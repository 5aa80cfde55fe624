/*!
help.rs - usage, help and result rendering.

All functions are pure with respect to their inputs and write to the
given sink:
  print_usage        usage line for top level / module / command
  print_modules      "Available modules" table
  print_cmd_set_help "Available commands" table
  print_cmd_help     usage + parameter table of one command
  print_payload      rendered output payload of a call
  print_progress_bar progress line (carriage-return refreshed)

Hidden parameters are left out of help; they are still accepted.
*/

use std::io::{self, Write};

use crate::cmd::format::{Role, StyleOptions, color, progress_bar, table};
use crate::cmd::{Command, CommandSet, Parameter};
use crate::module::Module;
use crate::payload::{Payload, Value};

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

const PROGRESS_WIDTH: usize = 40;

/* ---- Usage ---- */

pub fn print_usage(
    out: &mut dyn Write,
    module: Option<&Module>,
    command: Option<&dyn Command>,
    has_modules: bool,
    style: &StyleOptions,
) -> io::Result<()> {
    let mut line = format!("{} {}", color(Role::Bold, "Usage:", style), APP_NAME);
    if let Some(m) = module {
        line.push(' ');
        line.push_str(m.long_key());
    }
    match command {
        Some(cmd) => {
            line.push(' ');
            line.push_str(&cmd.key().long);
            for p in cmd.params().iter().filter(|p| !p.is_hidden()) {
                line.push(' ');
                line.push_str(&usage_token(p));
            }
        }
        None => {
            if module.is_none() && has_modules {
                line.push_str(" [module]");
            }
            line.push_str(" <command> [params...]");
        }
    }
    writeln!(out, "{line}")
}

fn usage_token(p: &Parameter) -> String {
    let mut token = format!("--{}", p.long_key());
    if p.field_type() != crate::payload::FieldType::Bool {
        token.push_str(&format!(" <{}>", p.field_type()));
    }
    if p.is_repeated() {
        token.push_str("...");
    }
    if p.is_required() {
        token
    } else {
        format!("[{token}]")
    }
}

fn keys_label(long: &str, short: Option<&str>) -> String {
    match short {
        Some(s) => format!("{long}, {s}"),
        None => long.to_string(),
    }
}

/* ---- Modules / Command Sets ---- */

pub fn print_modules<'a>(
    out: &mut dyn Write,
    modules: impl Iterator<Item = &'a Module>,
    style: &StyleOptions,
) -> io::Result<()> {
    let rows: Vec<Vec<String>> = modules
        .map(|m| {
            let locality = if m.is_local() { "local" } else { "node" };
            vec![
                keys_label(m.long_key(), m.short_key()),
                locality.to_string(),
                m.description().to_string(),
            ]
        })
        .collect();
    if rows.is_empty() {
        return Ok(());
    }
    writeln!(out, "\n{}", color(Role::Bold, "Available modules:", style))?;
    write!(out, "{}", table(&["MODULE", "KIND", "DESCRIPTION"], &rows, style))
}

pub fn print_cmd_set_help(
    out: &mut dyn Write,
    set: &CommandSet,
    style: &StyleOptions,
) -> io::Result<()> {
    writeln!(out, "\n{}", color(Role::Bold, "Available commands:", style))?;
    let rows: Vec<Vec<String>> = set
        .iter()
        .map(|c| {
            let key = c.key();
            vec![
                keys_label(&key.long, key.short.as_deref()),
                key.description.clone(),
            ]
        })
        .collect();
    write!(out, "{}", table(&["COMMAND", "DESCRIPTION"], &rows, style))?;
    if set.is_empty() {
        writeln!(
            out,
            "{}",
            color(Role::Dim, "(no commands available for this module)", style)
        )?;
    }
    Ok(())
}

/* ---- Single Command ---- */

pub fn print_cmd_help(
    out: &mut dyn Write,
    command: &dyn Command,
    module: Option<&Module>,
    style: &StyleOptions,
) -> io::Result<()> {
    print_usage(out, module, Some(command), module.is_some(), style)?;
    let description = &command.key().description;
    if !description.is_empty() {
        writeln!(out, "\n{description}")?;
    }

    let rows: Vec<Vec<String>> = command
        .params()
        .iter()
        .filter(|p| !p.is_hidden())
        .map(|p| {
            let mut flags = Vec::new();
            if p.is_required() {
                flags.push("required");
            }
            if p.is_repeated() {
                flags.push("repeated");
            }
            let keys = match p.short_key() {
                Some(s) => format!("-{s}, --{}", p.long_key()),
                None => format!("--{}", p.long_key()),
            };
            vec![
                keys,
                p.field_type().to_string(),
                flags.join(","),
                p.description().to_string(),
            ]
        })
        .collect();
    if rows.is_empty() {
        return Ok(());
    }
    writeln!(out, "\n{}", color(Role::Bold, "Parameters:", style))?;
    write!(
        out,
        "{}",
        table(&["PARAMETER", "TYPE", "FLAGS", "DESCRIPTION"], &rows, style)
    )
}

/* ---- Results ---- */

/// Single-field payloads print their value(s) bare, one per line;
/// anything else renders as a NAME/VALUE table.
pub fn print_payload(out: &mut dyn Write, payload: &Payload, style: &StyleOptions) -> io::Result<()> {
    let entries: Vec<_> = payload.entries().collect();
    if let [(_, value)] = entries.as_slice() {
        match value {
            Value::List(items) => {
                for item in items {
                    writeln!(out, "{item}")?;
                }
            }
            scalar => writeln!(out, "{scalar}")?,
        }
        return Ok(());
    }
    if entries.is_empty() {
        return Ok(());
    }
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|(field, value)| vec![field.name.clone(), value.to_string()])
        .collect();
    write!(out, "{}", table(&["NAME", "VALUE"], &rows, style))
}

pub fn print_progress_bar(out: &mut dyn Write, fraction: f64, style: &StyleOptions) -> io::Result<()> {
    write!(out, "\r{}", progress_bar(fraction, PROGRESS_WIDTH, style))?;
    if fraction >= 1.0 {
        writeln!(out)?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::SchemaCommand;
    use crate::node::CommandDescription;
    use crate::payload::{FieldSchema, FieldType, MessageSchema};

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn command() -> SchemaCommand {
        SchemaCommand::from_description(CommandDescription {
            key: "stat".into(),
            short_key: Some("s".into()),
            description: "Show device statistics".into(),
            interface_id: "disk".into(),
            method_id: "stat".into(),
            input: MessageSchema::new(
                "In",
                vec![
                    FieldSchema::new("device", FieldType::String)
                        .required()
                        .short("d")
                        .describe("block device"),
                    FieldSchema::new("verbose", FieldType::Bool),
                    FieldSchema::new("secret", FieldType::String).hidden(),
                ],
            ),
            output: MessageSchema::default(),
        })
    }

    #[test]
    fn command_help_omits_hidden_parameters() {
        let style = StyleOptions::plain();
        let module = Module::remote("disk", "disk-node");
        let text = render(|out| print_cmd_help(out, &command(), Some(&module), &style));
        assert!(text.starts_with("Usage: nodectl disk stat --device <string> [--verbose]\n"));
        assert!(text.contains("Show device statistics"));
        assert!(text.contains("-d, --device"));
        assert!(text.contains("required"));
        assert!(!text.contains("secret"));
    }

    #[test]
    fn top_level_usage_mentions_modules_only_when_present() {
        let style = StyleOptions::plain();
        let with = render(|out| print_usage(out, None, None, true, &style));
        let without = render(|out| print_usage(out, None, None, false, &style));
        assert_eq!(with, "Usage: nodectl [module] <command> [params...]\n");
        assert_eq!(without, "Usage: nodectl <command> [params...]\n");
    }

    #[test]
    fn empty_command_set_still_renders() {
        let style = StyleOptions::plain();
        let text = render(|out| print_cmd_set_help(out, &CommandSet::new(), &style));
        assert!(text.contains("help, h"));
        assert!(text.contains("no commands available"));
    }

    #[test]
    fn single_field_payload_prints_bare_lines() {
        let schema = MessageSchema::new(
            "Out",
            vec![FieldSchema::new("text", FieldType::String).repeated()],
        );
        let mut p = Payload::new(schema);
        p.set(
            "text",
            Value::List(vec![Value::String("one".into()), Value::String("two".into())]),
        )
        .unwrap();
        let text = render(|out| print_payload(out, &p, &StyleOptions::plain()));
        assert_eq!(text, "one\ntwo\n");
    }

    #[test]
    fn multi_field_payload_renders_table() {
        let schema = MessageSchema::new(
            "Out",
            vec![
                FieldSchema::new("reads", FieldType::Uint64),
                FieldSchema::new("writes", FieldType::Uint64),
            ],
        );
        let mut p = Payload::new(schema);
        p.set("reads", Value::Uint64(12)).unwrap();
        let text = render(|out| print_payload(out, &p, &StyleOptions::plain()));
        assert!(text.contains("reads   12"));
        assert!(text.contains("writes  0"));
    }
}
