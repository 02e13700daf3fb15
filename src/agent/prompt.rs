use std::fs;
use std::path::Path;

use crate::proverbs::{ProverbError, ProverbResult};

pub const SYSTEM_PROMPT_SUFFIX: &str = "If tool parameters are not specified, always ask the user for the parameters before calling the tool. Don't assume parameters of tools if not provided earlier.";

pub const FINALIZE_INSTRUCTION: &str = "The tool loop is complete. Do not call functions. Provide the best concise plain-text answer from available context.";

pub const REPAIR_INSTRUCTION: &str = "Your previous response was invalid for this tool loop. Either call a declared function or provide a non-empty plain-text final answer.";

const ACTIONS_PROMPT: &str = r#"Extract the possible actions (short button texts) from the LLM response below.
{response}
The actions should have the following JSON format. Only return the JSON, don't use a json block, just the pure json string
[
    {
        "text": "Action 1",
        "value": "action1"
    },
    {
        "text": "Action 2",
        "value": "action2"
    }
]
The actions should be extracted from the LLM provided possible responses, e.g. the missing words or meanings of proverbs.
Only extract the actions that are relevant to the user's input and are related to possible actions that the user can take.
Use the exact words from the response to fill the value field.
The value is the short text that is used in the action button.
If there are no such actions, return an empty array: []"#;

/// Reads the system prompt file and appends the fixed tool-parameter rule.
pub fn load_system_prompt(path: &Path) -> ProverbResult<String> {
    let source_name = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|err| {
        ProverbError::data_format(&source_name, format!("unable to read file: {err}"))
    })?;
    if text.trim().is_empty() {
        return Err(ProverbError::data_format(
            source_name,
            "system prompt is empty",
        ));
    }

    Ok(with_suffix(&text))
}

fn with_suffix(base: &str) -> String {
    format!("{}\n\n{SYSTEM_PROMPT_SUFFIX}", base.trim_end())
}

pub fn actions_prompt(response: &str) -> String {
    ACTIONS_PROMPT.replace("{response}", response)
}
