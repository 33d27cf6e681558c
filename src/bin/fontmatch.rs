use std::env;
use std::fmt::{self, Write as _};
use std::path::Path;
use std::process::ExitCode;

use fontmatch::{Document, FontMatchRule, FontconfigError, RuleSet, WriteOptions};

/// JSON value printed by the CLI; `{:#}` renders it indented
#[derive(Debug)]
enum Json {
    Bool(bool),
    Num(usize),
    Str(String),
    Arr(Vec<Json>),
    Obj(Vec<(&'static str, Json)>),
}

impl Json {
    fn strings(values: &[String]) -> Self {
        Json::Arr(values.iter().cloned().map(Json::Str).collect())
    }

    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, level: usize) -> fmt::Result {
        match self {
            Json::Bool(v) => write!(f, "{}", v),
            Json::Num(v) => write!(f, "{}", v),
            Json::Str(v) => write_quoted(f, v),
            Json::Arr(items) => {
                f.write_char('[')?;
                for (idx, item) in items.iter().enumerate() {
                    separate(f, idx, level + 1)?;
                    item.fmt_at(f, level + 1)?;
                }
                close(f, ']', items.is_empty(), level)
            }
            Json::Obj(fields) => {
                f.write_char('{')?;
                for (idx, (key, value)) in fields.iter().enumerate() {
                    separate(f, idx, level + 1)?;
                    write_quoted(f, key)?;
                    f.write_str(if f.alternate() { ": " } else { ":" })?;
                    value.fmt_at(f, level + 1)?;
                }
                close(f, '}', fields.is_empty(), level)
            }
        }
    }
}

/// Comma before every item but the first; newline and indent when pretty
fn separate(f: &mut fmt::Formatter<'_>, idx: usize, level: usize) -> fmt::Result {
    if idx > 0 {
        f.write_char(',')?;
    }
    if f.alternate() {
        write!(f, "\n{:width$}", "", width = level * 2)?;
    }
    Ok(())
}

fn close(f: &mut fmt::Formatter<'_>, bracket: char, empty: bool, level: usize) -> fmt::Result {
    if f.alternate() && !empty {
        write!(f, "\n{:width$}", "", width = level * 2)?;
    }
    f.write_char(bracket)
}

impl fmt::Display for Json {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for ch in s.chars() {
        match ch {
            '"' | '\\' => write!(f, "\\{}", ch)?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

fn print_json(value: &Json, pretty: bool) {
    if pretty {
        println!("{:#}", value);
    } else {
        println!("{}", value);
    }
}

fn main() -> ExitCode {
    if let Err(msg) = run(env::args().skip(1).collect()) {
        eprintln!("fontmatch: {}", msg);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(mut rest: Vec<String>) -> Result<(), String> {
    let pretty = take_flag(&mut rest, "--pretty");

    if rest.is_empty() || rest[0] == "--help" || rest[0] == "-h" {
        print_help();
        return Ok(());
    }

    let cmd = rest.remove(0);
    match cmd.as_str() {
        "list" => {
            let path = first_arg(&rest, "list requires <conf_path>")?;
            let doc = Document::open(&path).map_err(display_err)?;
            let set = RuleSet::from_document(&doc).map_err(display_err)?;
            let rules = set
                .rules()
                .iter()
                .enumerate()
                .map(|(index, rule)| rule_json(index, rule))
                .collect::<Vec<_>>();
            let output = Json::Obj(vec![
                ("conf", Json::Str(path)),
                ("count", Json::Num(rules.len())),
                ("rules", Json::Arr(rules)),
            ]);
            print_json(&output, pretty);
        }
        "add" => {
            let mut args = rest;
            let write = take_flag(&mut args, "--write");
            let path = first_arg(&args, "add requires <conf_path>")?;
            let family = option_value(&args, "--family")?
                .ok_or_else(|| "add requires --family <name>".to_string())?;
            let lang = option_value(&args, "--lang")?;
            let prefer = option_values(&args, "--prefer")?;
            if prefer.is_empty() {
                return Err("add requires at least one --prefer <name>".to_string());
            }

            let mut doc = open_or_new(&path)?;
            let mut set = RuleSet::from_document(&doc).map_err(display_err)?;
            let rule = FontMatchRule::with_fields(Some(family), lang, Some(prefer));
            let replaced = set.upsert(rule).is_some();
            set.write_to_document(&mut doc).map_err(display_err)?;
            emit(&doc, &path, write)?;
            if write {
                let output = Json::Obj(vec![
                    ("conf", Json::Str(path)),
                    ("replaced", Json::Bool(replaced)),
                    ("count", Json::Num(set.len())),
                ]);
                print_json(&output, pretty);
            }
        }
        "remove" => {
            let mut args = rest;
            let write = take_flag(&mut args, "--write");
            let path = first_arg(&args, "remove requires <conf_path>")?;
            let family = option_value(&args, "--family")?
                .ok_or_else(|| "remove requires --family <name>".to_string())?;
            let lang = option_value(&args, "--lang")?;

            let mut doc = Document::open(&path).map_err(display_err)?;
            let mut set = RuleSet::from_document(&doc).map_err(display_err)?;
            let Some(removed) = set.remove(&family, lang.as_deref()) else {
                return Err(format!("no rule for family '{}'", family));
            };
            set.write_to_document(&mut doc).map_err(display_err)?;
            emit(&doc, &path, write)?;
            if write {
                let output = Json::Obj(vec![
                    ("conf", Json::Str(path)),
                    ("removed", rule_json(0, &removed)),
                    ("count", Json::Num(set.len())),
                ]);
                print_json(&output, pretty);
            }
        }
        "init" => {
            let doc = Document::new_fontconfig();
            let xml = doc
                .to_xml_string(&WriteOptions::default())
                .map_err(display_err)?;
            print!("{}", xml);
        }
        _ => {
            return Err(format!(
                "unknown command '{}'; run `fontmatch --help` for usage",
                cmd
            ));
        }
    }

    Ok(())
}

fn open_or_new(path: &str) -> Result<Document, String> {
    if Path::new(path).exists() {
        Document::open(path).map_err(display_err)
    } else {
        Ok(Document::new_fontconfig())
    }
}

fn emit(doc: &Document, path: &str, write: bool) -> Result<(), String> {
    let options = WriteOptions::default();
    if write {
        doc.save(path, &options).map_err(display_err)
    } else {
        let xml = doc.to_xml_string(&options).map_err(display_err)?;
        print!("{}", xml);
        Ok(())
    }
}

fn first_arg(args: &[String], msg: &str) -> Result<String, String> {
    args.first()
        .filter(|a| !a.starts_with("--"))
        .cloned()
        .ok_or_else(|| msg.to_string())
}

/// Remove every occurrence of `flag`, reporting whether there was one
fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    let before = args.len();
    args.retain(|a| a != flag);
    args.len() != before
}

fn option_values(args: &[String], name: &str) -> Result<Vec<String>, String> {
    let mut values = Vec::new();
    let mut i = 1usize;
    while i < args.len() {
        if args[i] == name {
            let value = args
                .get(i + 1)
                .ok_or_else(|| format!("{} requires a value", name))?;
            values.push(value.clone());
            i += 2;
        } else {
            i += 1;
        }
    }
    Ok(values)
}

fn option_value(args: &[String], name: &str) -> Result<Option<String>, String> {
    let mut values = option_values(args, name)?;
    if values.len() > 1 {
        return Err(format!("{} given more than once", name));
    }
    Ok(values.pop())
}

/// Rules in a [`RuleSet`] are never empty; `lang` is left out when unset.
fn rule_json(index: usize, rule: &FontMatchRule) -> Json {
    let mut fields = vec![
        ("index", Json::Num(index)),
        ("family", Json::Str(rule.family_test.clone().unwrap_or_default())),
    ];
    if let Some(lang) = &rule.lang_test {
        fields.push(("lang", Json::Str(lang.clone())));
    }
    fields.push((
        "prefer",
        Json::strings(rule.family_edit.as_deref().unwrap_or_default()),
    ));
    Json::Obj(fields)
}

fn display_err(err: FontconfigError) -> String {
    err.to_string()
}

fn print_help() {
    let help = r#"fontmatch - edit fontconfig font substitution rules

USAGE:
  fontmatch [--pretty] <command> [args...]

COMMANDS:
  list <conf_path>
  add <conf_path> --family <name> [--lang <code>] --prefer <name>... [--write]
  remove <conf_path> --family <name> [--lang <code>] [--write]
  init

NOTES:
  - `list` output is JSON.
  - `add` and `remove` print the updated file unless --write is given.
  - `add` starts from an empty fontconfig file when <conf_path> does not exist.
  - A --lang of "en" is the default and is not written to the file.
"#;
    println!("{}", help);
}
