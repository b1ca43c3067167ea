use std::{
    collections::HashSet,
    env, fs,
    io::{self, BufRead, Read, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use dotenv::dotenv;
use wiki_extractor::{
    Document, Extractor, ExtractorConfig,
    wikitext::{MathMode, MemoryTemplateStore, OutputFormat, WtError, errors::Result},
};

/// Environment variables read by [`config_from_vars`].
///
/// - `WIKI_FORMAT`: text, markdown, html or json
/// - `WIKI_KEEP_LINKS`, `WIKI_KEEP_SECTIONS`, `WIKI_EXPAND_TEMPLATES`,
///   `WIKI_MARK_HEADERS`, `WIKI_HTML_SAFE`: booleans
/// - `WIKI_DISCARD_SECTIONS`, `WIKI_DISCARD_TEMPLATES`: comma separated
/// - `WIKI_LANGUAGE`, `WIKI_MATH` (drop, placeholder, latex)
/// - `WIKI_MAX_DEPTH`, `WIKI_MAX_EXPANSION_SIZE`
/// - `WIKI_TEMPLATES`: directory of `<Template name>.wiki` bodies
const PREFIX: &str = "WIKI_";

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(WtError::config(format!("{}{}: not a boolean: {}", PREFIX, name, other))),
    }
}

fn parse_list(value: &str) -> HashSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_usize(name: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| WtError::config(format!("{}{}: not a number: {}", PREFIX, name, value)))
}

/// Build the configuration from `lookup` (normally the process environment).
fn config_from_vars<F>(lookup: F) -> Result<ExtractorConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(&format!("{}{}", PREFIX, name));
    let mut config = ExtractorConfig::default();

    if let Some(v) = var("FORMAT") {
        let format = OutputFormat::from_str(&v).map_err(WtError::config)?;
        config = config.with_format(format);
    }
    if let Some(v) = var("KEEP_LINKS") {
        config.keep_links = parse_bool("KEEP_LINKS", &v)?;
    }
    if let Some(v) = var("KEEP_SECTIONS") {
        config.keep_sections = parse_bool("KEEP_SECTIONS", &v)?;
    }
    if let Some(v) = var("EXPAND_TEMPLATES") {
        config.expand_templates = parse_bool("EXPAND_TEMPLATES", &v)?;
    }
    if let Some(v) = var("MARK_HEADERS") {
        config.mark_headers = parse_bool("MARK_HEADERS", &v)?;
    }
    if let Some(v) = var("HTML_SAFE") {
        config.html_safe = parse_bool("HTML_SAFE", &v)?;
    }
    if let Some(v) = var("DISCARD_SECTIONS") {
        config.discard_sections = parse_list(&v);
    }
    if let Some(v) = var("DISCARD_TEMPLATES") {
        config.discard_templates = parse_list(&v);
    }
    if let Some(v) = var("LANGUAGE") {
        config.language = v.trim().to_string();
    }
    if let Some(v) = var("MATH") {
        config.math_mode = MathMode::from_str(&v).map_err(WtError::config)?;
    }
    if let Some(v) = var("MAX_DEPTH") {
        config.max_depth = parse_usize("MAX_DEPTH", &v)?;
    }
    if let Some(v) = var("MAX_EXPANSION_SIZE") {
        config.max_expansion_size = parse_usize("MAX_EXPANSION_SIZE", &v)?;
    }
    config.validate()?;
    Ok(config)
}

/// Load every `*.wiki` file of `dir`, named after its file stem.
fn load_templates(dir: &Path) -> Result<MemoryTemplateStore> {
    let mut store = MemoryTemplateStore::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "wiki")
            && let Some(name) = path.file_stem().and_then(|s| s.to_str())
        {
            store.insert(name, &fs::read_to_string(&path)?);
        }
    }
    log::info!("Loaded {} templates from {:?}", store.len(), dir);
    Ok(store)
}

/// Documents to process: JSON lines when the input ends in `.json`/`.jsonl`,
/// otherwise one raw markup document.
fn read_documents(input: Option<&PathBuf>) -> Result<Vec<Document>> {
    let is_json = input
        .and_then(|p| p.extension())
        .is_some_and(|e| e == "json" || e == "jsonl");

    if is_json {
        let path = input.ok_or_else(|| WtError::invalid_arg("no input file"))?;
        let file = fs::File::open(path)?;
        let mut documents = Vec::new();
        for line in io::BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            documents.push(serde_json::from_str::<Document>(&line)?);
        }
        return Ok(documents);
    }

    let (title, text) = match input {
        Some(path) => (
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .replace('_', " "),
            fs::read_to_string(path)?,
        ),
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            (String::new(), text)
        }
    };
    Ok(vec![Document::new("0", title, text)])
}

fn run() -> Result<()> {
    let config = config_from_vars(|name| env::var(name).ok())?;
    let mut extractor = Extractor::new(config)?;
    if let Ok(dir) = env::var(format!("{}TEMPLATES", PREFIX)) {
        extractor = extractor.with_templates(load_templates(Path::new(&dir))?);
    }

    let input = env::args().nth(1).filter(|a| a != "-").map(PathBuf::from);
    let documents = read_documents(input.as_ref())?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for document in &documents {
        writeln!(out, "{}", extractor.extract_to_string(document)?)?;
    }
    log::info!("Extracted {} documents", documents.len());
    Ok(())
}

fn main() {
    env_logger::init();
    dotenv().ok();

    if let Err(e) = run() {
        log::error!("{}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
