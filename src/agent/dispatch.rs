use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::llm::provider::{AssistantPart, FunctionDeclaration};
use crate::proverbs::{
    self, Instruction, ProverbEntry, ProverbError, ProverbResult, ProverbSample, ProverbStore,
};

#[derive(Debug, Clone)]
pub struct FunctionCallSpec {
    pub id: Option<String>,
    pub name: String,
    pub args_json: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    GetRandomProverb,
    ExplainProverb,
    GameWordSubstitution,
    GameGuessMeaning,
    CreateFile,
}

pub struct ToolSpec {
    pub kind: ToolKind,
    pub name: &'static str,
    pub description: &'static str,
    schema: fn() -> Value,
}

impl ToolSpec {
    pub fn parameters_schema(&self) -> Value {
        (self.schema)()
    }
}

pub static TOOL_TABLE: [ToolSpec; 5] = [
    ToolSpec {
        kind: ToolKind::GetRandomProverb,
        name: "GetRandomProverb",
        description: "Returns random Hungarian proverbs with their meanings.",
        schema: count_params,
    },
    ToolSpec {
        kind: ToolKind::ExplainProverb,
        name: "ExplainProverb",
        description: "Explain the meaning of a proverb.",
        schema: proverb_params,
    },
    ToolSpec {
        kind: ToolKind::GameWordSubstitution,
        name: "GameWordSubstitution",
        description: "A game where the player has to guess the missing word in a proverb. Don't ask the number of proverbs to be used in the game.",
        schema: no_params,
    },
    ToolSpec {
        kind: ToolKind::GameGuessMeaning,
        name: "GameGuessMeaning",
        description: "A game where the player has to guess the meaning of a proverb. Don't ask the number of proverbs to be used in the game.",
        schema: no_params,
    },
    ToolSpec {
        kind: ToolKind::CreateFile,
        name: "CreateFile",
        description: "Create a file (for example an HTML page) with the specified content and file name.",
        schema: create_file_params,
    },
];

fn no_params() -> Value {
    json!({"type": "object", "properties": {}})
}

fn count_params() -> Value {
    json!({
        "type": "object",
        "properties": {
            "count": {
                "type": "integer",
                "description": "Number of proverbs to return.",
                "default": 1
            }
        }
    })
}

fn proverb_params() -> Value {
    json!({
        "type": "object",
        "properties": {
            "proverb": {"type": "string", "description": "Proverb to explain."}
        },
        "required": ["proverb"]
    })
}

fn create_file_params() -> Value {
    json!({
        "type": "object",
        "properties": {
            "content": {"type": "string", "description": "The content of the file."},
            "fileName": {
                "type": "string",
                "description": "The name of the file, relative to the output directory."
            }
        },
        "required": ["content", "fileName"]
    })
}

pub fn find_tool(name: &str) -> Option<&'static ToolSpec> {
    TOOL_TABLE.iter().find(|spec| spec.name == name)
}

pub fn tool_declarations() -> Vec<FunctionDeclaration> {
    TOOL_TABLE
        .iter()
        .map(|spec| FunctionDeclaration {
            name: spec.name.to_string(),
            description: spec.description.to_string(),
            parameters_json_schema: spec.parameters_schema(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    Proverb(ProverbError),
    InvalidArgs(String),
    Io { path: String, message: String },
    UnknownTool(String),
}

impl ToolError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Proverb(ProverbError::InvalidArgument(_)) => "invalid_argument",
            Self::Proverb(ProverbError::DataFormat { .. }) => "data_format",
            Self::InvalidArgs(_) => "invalid_args",
            Self::Io { .. } => "io_error",
            Self::UnknownTool(_) => "unknown_function",
        }
    }

    fn details(&self) -> Value {
        match self {
            Self::Io { path, .. } => json!({"path": path}),
            _ => json!({}),
        }
    }
}

impl Display for ToolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Proverb(err) => write!(f, "{err}"),
            Self::InvalidArgs(msg) => write!(f, "invalid arguments: {msg}"),
            Self::Io { path, message } => write!(f, "failed to write {path}: {message}"),
            Self::UnknownTool(name) => write!(f, "unknown function: {name}"),
        }
    }
}

impl Error for ToolError {}

impl From<ProverbError> for ToolError {
    fn from(err: ProverbError) -> Self {
        Self::Proverb(err)
    }
}

/// Result of one dispatched call: the envelope returned to the model and the
/// line recorded in the conversation history.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub response: AssistantPart,
    pub summary: String,
    pub ok: bool,
}

impl ToolOutcome {
    pub fn response_json(&self) -> &Value {
        match &self.response {
            AssistantPart::FunctionResponse { response_json, .. } => response_json,
            _ => &Value::Null,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GetRandomProverbArgs {
    #[serde(default = "default_count")]
    count: i64,
}

fn default_count() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExplainProverbArgs {
    proverb: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct CreateFileArgs {
    content: String,
    file_name: String,
}

/// Handler context for the proverb tools. Shared read-only by every session.
#[derive(Debug, Clone)]
pub struct ProverbTools {
    store: Arc<ProverbStore>,
    game_size: usize,
    output_dir: PathBuf,
    rng: Option<Arc<Mutex<StdRng>>>,
}

impl ProverbTools {
    pub fn new(store: Arc<ProverbStore>, game_size: usize, output_dir: PathBuf) -> Self {
        Self {
            store,
            game_size,
            output_dir,
            rng: None,
        }
    }

    /// With a seed all draws come from one generator seeded once, so a run
    /// repeats the same sequence of samples. Clones share the generator.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.rng = seed.map(|seed| Arc::new(Mutex::new(StdRng::seed_from_u64(seed))));
        self
    }

    pub fn store(&self) -> &ProverbStore {
        &self.store
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn sample(&self, count: usize) -> ProverbResult<ProverbSample> {
        match &self.rng {
            Some(rng) => {
                let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
                self.store.sample_with(count, &mut *rng)
            }
            None => self.store.sample(count),
        }
    }

    pub fn get_random_proverb(&self, count: i64) -> Result<ProverbSample, ToolError> {
        let count = usize::try_from(count)
            .ok()
            .filter(|count| *count > 0)
            .ok_or_else(|| {
                ProverbError::InvalidArgument(format!("sample size must be at least 1, got {count}"))
            })?;
        Ok(self.sample(count)?)
    }

    pub fn explain_proverb(&self, proverb: &str) -> String {
        proverbs::render(&Instruction::Explain { proverb })
    }

    pub fn game_word_substitution(&self) -> Result<String, ToolError> {
        let sample = self.sample(self.game_size)?;
        Ok(proverbs::render(&Instruction::WordSubstitutionGame(&sample)))
    }

    pub fn game_guess_meaning(&self) -> Result<String, ToolError> {
        let sample = self.sample(self.game_size)?;
        Ok(proverbs::render(&Instruction::MeaningGuessGame(&sample)))
    }

    /// Writes `content` to `file_name` below the output directory, replacing
    /// any existing file. Absolute paths and `..` components are refused.
    pub fn create_file(&self, content: &str, file_name: &str) -> Result<PathBuf, ToolError> {
        let relative = Path::new(file_name);
        if file_name.trim().is_empty() {
            return Err(ToolError::InvalidArgs("fileName must not be empty".to_string()));
        }
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
        {
            return Err(ToolError::InvalidArgs(format!(
                "fileName must be a relative path inside the output directory: {file_name}"
            )));
        }

        let path = self.output_dir.join(relative);
        let io_error = |err: std::io::Error| ToolError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(&path, content).map_err(io_error)?;
        Ok(path)
    }

    pub fn dispatch(&self, call: &FunctionCallSpec) -> ToolOutcome {
        let result = match find_tool(&call.name) {
            Some(spec) => self.run(spec.kind, &call.args_json),
            None => Err(ToolError::UnknownTool(call.name.clone())),
        };

        let (response_json, shown) = match &result {
            Ok(value) => (
                json!({"ok": true, "result": value}),
                display_value(value),
            ),
            Err(err) => (
                json!({
                    "ok": false,
                    "error": {
                        "code": err.code(),
                        "message": err.to_string(),
                        "details": err.details(),
                    }
                }),
                format!("error: {err}"),
            ),
        };

        ToolOutcome {
            response: AssistantPart::FunctionResponse {
                id: call.id.clone(),
                name: call.name.clone(),
                response_json,
                thought_signature: None,
            },
            summary: format!(
                "Function called: {}({}), result: {shown}",
                call.name,
                format_args_summary(&call.args_json)
            ),
            ok: result.is_ok(),
        }
    }

    fn run(&self, kind: ToolKind, args: &Value) -> Result<Value, ToolError> {
        match kind {
            ToolKind::GetRandomProverb => {
                let args: GetRandomProverbArgs = parse_args(args)?;
                let sample = self.get_random_proverb(args.count)?;
                Ok(Value::Array(sample.into_iter().map(entry_value).collect()))
            }
            ToolKind::ExplainProverb => {
                let args: ExplainProverbArgs = parse_args(args)?;
                Ok(Value::String(self.explain_proverb(&args.proverb)))
            }
            ToolKind::GameWordSubstitution => {
                let _: NoArgs = parse_args(args)?;
                self.game_word_substitution().map(Value::String)
            }
            ToolKind::GameGuessMeaning => {
                let _: NoArgs = parse_args(args)?;
                self.game_guess_meaning().map(Value::String)
            }
            ToolKind::CreateFile => {
                let args: CreateFileArgs = parse_args(args)?;
                let path = self.create_file(&args.content, &args.file_name)?;
                Ok(json!({"path": path.display().to_string(), "bytes": args.content.len()}))
            }
        }
    }
}

// Omitted or null arguments mean "no arguments".
fn parse_args<T: DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    let args = if args.is_null() {
        Value::Object(Map::new())
    } else {
        args.clone()
    };
    serde_json::from_value(args).map_err(|err| ToolError::InvalidArgs(err.to_string()))
}

fn entry_value(entry: ProverbEntry) -> Value {
    let mut object = Map::new();
    object.insert("proverb".to_string(), Value::String(entry.proverb));
    object.insert("meaning".to_string(), Value::String(entry.meaning));
    Value::Object(object)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn format_args_summary(args: &Value) -> String {
    let Some(object) = args.as_object() else {
        return String::new();
    };

    object
        .iter()
        .map(|(name, value)| format!("{name}='{}'", display_value(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use serde_json::{Value, json};

    use super::{FunctionCallSpec, ProverbTools, TOOL_TABLE, ToolError, tool_declarations};
    use crate::proverbs::{EXPLAIN_GUARD, ProverbStore};

    fn tools_in(dir: &std::path::Path, count: usize) -> ProverbTools {
        let items = (0..count)
            .map(|i| format!(r#"{{"proverb":"közmondás {i}","meaning":"jelentés {i}"}}"#))
            .collect::<Vec<_>>()
            .join(",");
        let store = ProverbStore::from_json_str("inline", &format!("[{items}]")).expect("store");
        ProverbTools::new(Arc::new(store), 5, dir.to_path_buf())
    }

    fn call(name: &str, args: Value) -> FunctionCallSpec {
        FunctionCallSpec {
            id: Some("c1".to_string()),
            name: name.to_string(),
            args_json: args,
        }
    }

    #[test]
    fn declarations_cover_every_tool_once() {
        let declarations = tool_declarations();
        let names = declarations.iter().map(|d| d.name.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "GetRandomProverb",
                "ExplainProverb",
                "GameWordSubstitution",
                "GameGuessMeaning",
                "CreateFile"
            ]
        );
        assert_eq!(declarations.len(), TOOL_TABLE.len());
        assert_eq!(
            declarations[4].parameters_json_schema["required"],
            json!(["content", "fileName"])
        );
    }

    #[test]
    fn get_random_proverb_defaults_to_one() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outcome = tools_in(dir.path(), 10).dispatch(&call("GetRandomProverb", json!({})));

        assert!(outcome.ok);
        let result = &outcome.response_json()["result"];
        assert_eq!(result.as_array().map(Vec::len), Some(1));
        assert!(result[0]["proverb"].as_str().is_some());
        assert!(outcome.summary.starts_with("Function called: GetRandomProverb(), result: [{"));
    }

    #[test]
    fn get_random_proverb_returns_entries_from_the_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tools = tools_in(dir.path(), 3);
        let outcome = tools.dispatch(&call("GetRandomProverb", json!({"count": 3})));

        assert!(outcome.ok);
        let mut returned = outcome.response_json()["result"]
            .as_array()
            .expect("array")
            .iter()
            .map(|entry| {
                let object = entry.as_object().expect("object");
                assert_eq!(object.len(), 2);
                (
                    object["proverb"].as_str().expect("proverb").to_string(),
                    object["meaning"].as_str().expect("meaning").to_string(),
                )
            })
            .collect::<Vec<_>>();
        returned.sort();
        let mut expected = tools
            .store()
            .entries()
            .iter()
            .map(|entry| (entry.proverb.clone(), entry.meaning.clone()))
            .collect::<Vec<_>>();
        expected.sort();
        assert_eq!(returned, expected);
    }

    #[test]
    fn get_random_proverb_rejects_non_positive_and_oversized_counts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tools = tools_in(dir.path(), 3);

        for count in [0, -2, 4] {
            let outcome = tools.dispatch(&call("GetRandomProverb", json!({"count": count})));
            assert!(!outcome.ok);
            assert_eq!(
                outcome.response_json()["error"]["code"],
                json!("invalid_argument"),
                "count {count}"
            );
        }
    }

    #[test]
    fn explain_proverb_embeds_guard_and_records_summary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outcome = tools_in(dir.path(), 1).dispatch(&call(
            "ExplainProverb",
            json!({"proverb": "Nincs ilyen közmondás teszt123"}),
        ));

        let text = outcome.response_json()["result"].as_str().expect("text");
        assert!(text.contains("Nincs ilyen közmondás teszt123"));
        assert!(text.contains(EXPLAIN_GUARD));
        assert!(outcome.summary.starts_with(
            "Function called: ExplainProverb(proverb='Nincs ilyen közmondás teszt123'), result: "
        ));
    }

    #[test]
    fn games_use_the_configured_number_of_proverbs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tools = tools_in(dir.path(), 8);

        let text = tools.game_word_substitution().expect("word game");
        assert!(text.contains("5. közmondás"));
        assert!(!text.contains("6. közmondás"));

        let text = tools.game_guess_meaning().expect("meaning game");
        assert!(text.contains("1. közmondás"));
    }

    #[test]
    fn games_fail_when_collection_is_too_small() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = tools_in(dir.path(), 2)
            .game_guess_meaning()
            .expect_err("too few proverbs");
        assert_eq!(err.code(), "invalid_argument");
    }

    #[test]
    fn seeded_tools_repeat_the_run_but_not_each_draw() {
        let dir = tempfile::tempdir().expect("tempdir");
        let draws = |tools: &ProverbTools| {
            (0..4)
                .map(|_| tools.game_word_substitution().expect("word game"))
                .collect::<Vec<_>>()
        };

        let first_run = draws(&tools_in(dir.path(), 30).with_seed(Some(9)));
        let second_run = draws(&tools_in(dir.path(), 30).with_seed(Some(9)));

        assert_eq!(first_run, second_run);
        assert!(first_run.iter().any(|game| game != &first_run[0]));
    }

    #[test]
    fn game_tools_reject_unexpected_arguments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outcome =
            tools_in(dir.path(), 8).dispatch(&call("GameGuessMeaning", json!({"count": 3})));
        assert_eq!(outcome.response_json()["error"]["code"], json!("invalid_args"));

        let outcome = tools_in(dir.path(), 8).dispatch(&call("GameGuessMeaning", Value::Null));
        assert!(outcome.ok);
    }

    #[test]
    fn create_file_writes_exact_content_and_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tools = tools_in(dir.path(), 1);
        fs::write(dir.path().join("out.html"), "old content that is longer").expect("seed");

        let outcome = tools.dispatch(&call(
            "CreateFile",
            json!({"content": "<h1>hi</h5>", "fileName": "out.html"}),
        ));

        assert!(outcome.ok, "{:?}", outcome.response_json());
        assert_eq!(
            fs::read_to_string(dir.path().join("out.html")).expect("read"),
            "<h1>hi</h5>"
        );
        assert!(outcome
            .summary
            .starts_with("Function called: CreateFile(content='<h1>hi</h5>', fileName='out.html')"));
    }

    #[test]
    fn create_file_refuses_paths_outside_output_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tools = tools_in(dir.path(), 1);

        for name in ["../escape.html", "/tmp/abs.html", ""] {
            let err = tools.create_file("x", name).expect_err(name);
            assert!(matches!(err, ToolError::InvalidArgs(_)), "{name}");
        }

        let path = tools.create_file("x", "sub/dir/ok.txt").expect("nested");
        assert!(path.ends_with("sub/dir/ok.txt"));
    }

    #[test]
    fn create_file_reports_io_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("blocker"), "file").expect("seed");
        let outcome = tools_in(dir.path(), 1).dispatch(&call(
            "CreateFile",
            json!({"content": "x", "fileName": "blocker/inner.txt"}),
        ));

        assert!(!outcome.ok);
        assert_eq!(outcome.response_json()["error"]["code"], json!("io_error"));
        assert!(outcome.response_json()["error"]["details"]["path"].is_string());
    }

    #[test]
    fn unknown_tool_yields_error_envelope() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outcome = tools_in(dir.path(), 1).dispatch(&call("list_globals", json!({})));
        assert_eq!(
            outcome.response_json()["error"]["code"],
            json!("unknown_function")
        );
        assert_eq!(
            outcome.summary,
            "Function called: list_globals(), result: error: unknown function: list_globals"
        );
    }
}
