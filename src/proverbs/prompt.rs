use super::ProverbEntry;

pub const EXPLAIN_GUARD: &str =
    "ONLY EXPLAIN THE PROVERB IF THERE'S REALLY SUCH A HUNGARIAN PROVERB THAT EXISTS.";

/// What the model should do next, together with the data it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction<'a> {
    Explain { proverb: &'a str },
    WordSubstitutionGame(&'a [ProverbEntry]),
    MeaningGuessGame(&'a [ProverbEntry]),
}

struct GameWording {
    blanked: &'static str,
    answer: &'static str,
    options: &'static str,
    on_resolve: &'static str,
}

const WORD_GAME: GameWording = GameWording {
    blanked: "the important word replaced by a blank",
    answer: "missing word",
    options: "words",
    on_resolve: "give the meaning of the proverb",
};

const MEANING_GAME: GameWording = GameWording {
    blanked: "its meaning replaced by a blank",
    answer: "meaning of the proverb",
    options: "meanings",
    on_resolve: "repeat the correct meaning in one sentence",
};

/// Renders the instruction block handed to the model. Pure: identical input
/// always yields identical text.
pub fn render(instruction: &Instruction<'_>) -> String {
    match instruction {
        Instruction::Explain { proverb } => render_explain(proverb),
        Instruction::WordSubstitutionGame(sample) => render_game(&WORD_GAME, sample),
        Instruction::MeaningGuessGame(sample) => render_game(&MEANING_GAME, sample),
    }
}

fn render_explain(proverb: &str) -> String {
    [
        format!("Provide the meaning of the proverb: {proverb}"),
        "You can provide the meaning of the proverb in your own words.".to_string(),
        EXPLAIN_GUARD.to_string(),
        "If there is no such Hungarian proverb, say that you don't know it instead of inventing a meaning."
            .to_string(),
    ]
    .join("\n")
}

fn render_game(wording: &GameWording, sample: &[ProverbEntry]) -> String {
    let mut lines = vec!["Proverbs to be used in the game:".to_string()];
    lines.extend(
        sample
            .iter()
            .enumerate()
            .map(|(i, entry)| format!("{}. {}: {}", i + 1, entry.proverb, entry.meaning)),
    );
    lines.push(String::new());
    lines.push(format!(
        "Give the player one proverb at a time with {}. Never reveal the {} before the player has answered.",
        wording.blanked, wording.answer
    ));
    lines.push(format!(
        "ALWAYS PROVIDE 3 POSSIBLE {} TO PICK FROM, NEVER FEWER. All 3 options must be plausible.",
        wording.options.to_uppercase()
    ));
    lines.push(format!(
        "The player has to guess the {}. Accept the answer when it matches, ignoring case and smaller typos.",
        wording.answer
    ));
    lines.push(
        "If the guess is wrong, give a hint and let the player guess once more. If that guess is also wrong, reveal the answer."
            .to_string(),
    );
    lines.push(format!(
        "Once a proverb is resolved, {} and PROCEED TO THE NEXT PROVERB. DON'T ASK IF THE PLAYER WANTS TO CONTINUE.",
        wording.on_resolve
    ));
    lines.push(
        "USE ALL THE PROVERBS PROVIDED IN THE GAME, EACH EXACTLY ONCE AND IN THE GIVEN ORDER. DON'T SKIP ANY."
            .to_string(),
    );
    lines.push(
        "Once all the proverbs are done, tell the player their score and give one helpful improvement tip."
            .to_string(),
    );
    lines.join("\n")
}
