//! Real-world and story framing for generated questions.
//!
//! All randomness flows through the `rand::Rng` passed in by the caller, so a
//! seeded `ChaCha8Rng` makes enhancement reproducible.

use once_cell::sync::Lazy;
use rand::seq::IndexedRandom;
use rand::Rng;
use regex::Regex;

use crate::model::{ContextType, EnhancedQuestion, QuestionType, WorkflowContext};

static STORY_INDICATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(has|had|have|bought|buys|shared|shares|gave|gives|collected|baked|picked|saved|sold|found)\b",
    )
    .expect("valid regex")
});

/// Numbers with an optional attached sign and an optional `/d` fraction part.
static OPERAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?(?:/\d+)?").expect("valid regex"));

static RELATABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(cookies|apples|toys|friends|pizza|stickers|marbles|books|candies|money|dollars|game|games|pets|garden|cupcakes|pencils|soccer|party)\b",
    )
    .expect("valid regex")
});

const NAMES: &[&str] = &[
    "Maya", "Liam", "Sofia", "Noah", "Ava", "Ethan", "Zara", "Lucas", "Priya", "Mateo",
];

const ITEMS: &[&str] = &[
    "stickers", "marbles", "cookies", "apples", "books", "pencils", "cupcakes", "toys",
];

/// The arithmetic a template should express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Whether a question already reads like a story.
pub fn has_story_indicator(text: &str) -> bool {
    STORY_INDICATOR.is_match(text)
}

/// Probability that a question of this type gets a new framing.
pub fn enhancement_probability(question_type: QuestionType) -> f64 {
    match question_type {
        QuestionType::Addition | QuestionType::Subtraction => 0.8,
        QuestionType::Multiplication | QuestionType::Division => 0.7,
        QuestionType::Fractions | QuestionType::Mixed => 0.6,
        QuestionType::Decimals => 0.5,
        QuestionType::WordProblems => 0.0,
    }
}

/// (story, real-world, visual) weights by grade band; younger grades lean on stories.
fn style_weights(grade: u8) -> [(ContextType, f64); 3] {
    let (story, real_world, visual) = match grade {
        0..=2 => (0.7, 0.2, 0.1),
        3..=5 => (0.4, 0.45, 0.15),
        _ => (0.2, 0.65, 0.15),
    };
    [
        (ContextType::Story, story),
        (ContextType::RealWorld, real_world),
        (ContextType::Visual, visual),
    ]
}

fn pick_style<R: Rng + ?Sized>(grade: u8, rng: &mut R) -> ContextType {
    let roll: f64 = rng.random();
    let mut cumulative = 0.0;
    for (style, weight) in style_weights(grade) {
        cumulative += weight;
        if roll < cumulative {
            return style;
        }
    }
    ContextType::Visual
}

/// Words that put the second operand first ("3 less than 9", "take 4 from 10").
const REVERSED_ORDER: &[&str] = &["from", "than", "into"];

const OPERATION_WORDS: &[(Operation, &[&str])] = &[
    (Operation::Add, &["sum", "add", "plus", "total", "altogether"]),
    (Operation::Subtract, &["difference", "subtract", "minus", "take away"]),
    (Operation::Multiply, &["product", "multiply", "times"]),
    (Operation::Divide, &["quotient", "divide", "divided", "share", "split"]),
];

/// The two operands of a binary question and the text between them.
#[derive(Debug, PartialEq)]
struct Operands<'a> {
    a: &'a str,
    b: &'a str,
    between: &'a str,
}

/// Exactly two non-negative, non-fraction operands, or the reason the
/// question cannot be reframed.
fn extract_operands(text: &str) -> Result<Operands<'_>, &'static str> {
    let mut spans = Vec::new();
    for m in OPERAND.find_iter(text) {
        let mut start = m.start();
        if m.as_str().starts_with('-') {
            // "9-3" is a subtraction; "-4" on its own is a negative number.
            let binary = text[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == ')');
            if !binary {
                return Err("negative operand");
            }
            start += 1;
        }
        if text[start..m.end()].contains('/') {
            return Err("fraction operands");
        }
        spans.push((start, m.end()));
    }

    match spans.as_slice() {
        [(a_start, a_end), (b_start, b_end)] => Ok(Operands {
            a: &text[*a_start..*a_end],
            b: &text[*b_start..*b_end],
            between: &text[*a_end..*b_start],
        }),
        [] | [_] => Err("fewer than two numbers"),
        _ => Err("more than two numbers"),
    }
}

fn operator_symbol(between: &str) -> Option<Operation> {
    match between.trim().to_lowercase().as_str() {
        "+" | "plus" => Some(Operation::Add),
        "-" | "−" | "minus" => Some(Operation::Subtract),
        "×" | "*" | "x" | "times" | "multiplied by" => Some(Operation::Multiply),
        "÷" | "/" | "divided by" => Some(Operation::Divide),
        _ => None,
    }
}

/// The operation the question text asks for. `None` when it cannot be told
/// apart safely, in which case the question is left as-is.
fn operation_for(question_type: QuestionType, text: &str, between: &str) -> Option<Operation> {
    if let Some(operation) = operator_symbol(between) {
        return Some(operation);
    }

    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let padded = format!(" {} ", words.join(" "));
    let has_word = |w: &str| padded.contains(&format!(" {w} "));

    if REVERSED_ORDER.iter().any(|w| has_word(*w)) {
        return None;
    }

    let mut hits = OPERATION_WORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|w| has_word(*w)))
        .map(|(operation, _)| *operation);
    match (hits.next(), hits.next()) {
        (Some(operation), None) => Some(operation),
        (Some(_), Some(_)) => None,
        (None, _) => match question_type {
            QuestionType::Addition => Some(Operation::Add),
            QuestionType::Subtraction => Some(Operation::Subtract),
            QuestionType::Multiplication => Some(Operation::Multiply),
            QuestionType::Division => Some(Operation::Divide),
            _ => None,
        },
    }
}

fn templates(operation: Operation, style: ContextType) -> &'static [&'static str] {
    use Operation::*;
    match (operation, style) {
        (Add, ContextType::Story) => &[
            "{name} has {a} {item}. A friend gives {name} {b} more {item}. How many {item} does {name} have now?",
            "{name} collected {a} {item} on Monday and {b} {item} on Tuesday. How many {item} did {name} collect altogether?",
        ],
        (Add, ContextType::RealWorld) => &[
            "A school library lends out {a} books in the morning and {b} books in the afternoon. How many books are lent out in total?",
            "A bakery sells {a} cupcakes before lunch and {b} cupcakes after lunch. How many cupcakes does it sell in all?",
        ],
        (Add, ContextType::Visual) => &[
            "Picture two baskets: one holds {a} apples and the other holds {b} apples. How many apples are in both baskets?",
        ],
        (Subtract, ContextType::Story) => &[
            "{name} has {a} {item} and gives {b} of them to a friend. How many {item} does {name} have left?",
            "{name} baked {a} cookies and the family ate {b} of them. How many cookies are left?",
        ],
        (Subtract, ContextType::RealWorld) => &[
            "A parking lot has {a} cars. Then {b} cars drive away. How many cars are still in the lot?",
            "A store had {a} games on the shelf and {b} were bought today. How many games remain?",
        ],
        (Subtract, ContextType::Visual) => &[
            "Imagine a row of {a} balloons. If {b} balloons pop, how many balloons are still floating?",
        ],
        (Multiply, ContextType::Story) => &[
            "{name} has {a} bags with {b} {item} in each bag. How many {item} does {name} have in total?",
            "{name} reads {b} pages every day for {a} days. How many pages does {name} read?",
        ],
        (Multiply, ContextType::RealWorld) => &[
            "A classroom has {a} rows of desks with {b} desks in each row. How many desks are there?",
            "Each pizza is cut into {b} slices. How many slices are in {a} pizzas?",
        ],
        (Multiply, ContextType::Visual) => &[
            "Picture an array of {a} rows with {b} stars in each row. How many stars are in the array?",
        ],
        (Divide, ContextType::Story) => &[
            "{name} has {a} {item} and shares them equally among {b} friends. How many {item} does each friend get?",
            "{name} found {a} shells and puts them into {b} equal piles. How many shells are in each pile?",
        ],
        (Divide, ContextType::RealWorld) => &[
            "A coach splits {a} players into {b} equal teams. How many players are on each team?",
            "A farmer packs {a} eggs into cartons of {b}. How many cartons does the farmer fill?",
        ],
        (Divide, ContextType::Visual) => &[
            "Imagine {a} dots arranged into {b} equal groups. How many dots are in each group?",
        ],
        (_, ContextType::None) => &[],
    }
}

fn fill_template<R: Rng + ?Sized>(template: &str, a: &str, b: &str, rng: &mut R) -> String {
    let name = NAMES.choose(rng).copied().unwrap_or("Sam");
    let item = ITEMS.choose(rng).copied().unwrap_or("stickers");
    template
        .replace("{name}", name)
        .replace("{item}", item)
        .replace("{a}", a)
        .replace("{b}", b)
}

/// True when a capitalized word appears somewhere other than a sentence start.
fn has_mid_sentence_name(text: &str) -> bool {
    let mut sentence_start = true;
    for word in text.split_whitespace() {
        let bare = word.trim_matches(|c: char| !c.is_alphanumeric());
        let mut chars = bare.chars();
        let is_name = matches!(chars.next(), Some(c) if c.is_uppercase())
            && bare.len() > 1
            && chars.all(|c| c.is_lowercase());
        if is_name && !sentence_start {
            return true;
        }
        sentence_start = word.ends_with(['.', '?', '!']);
    }
    false
}

/// Heuristic engagement score in [0, 1].
pub fn engagement_score(original: &str, enhanced: &str, context_type: ContextType, grade: u8) -> f64 {
    let mut score: f64 = 0.5;
    if enhanced.len() as f64 > original.len() as f64 * 1.5 {
        score += 0.2;
    }
    if has_mid_sentence_name(enhanced) {
        score += 0.2;
    }
    if RELATABLE.is_match(enhanced) {
        score += 0.2;
    }
    if grade <= 3 && context_type == ContextType::Story {
        score += 0.1;
    }
    score.min(1.0)
}

/// Rewrites generated questions into engaging framings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextEnhancer;

impl ContextEnhancer {
    pub fn new() -> Self {
        Self
    }

    /// Enhance a single question text.
    pub fn enhance_question<R: Rng + ?Sized>(
        &self,
        text: &str,
        question_type: QuestionType,
        grade: u8,
        rng: &mut R,
    ) -> EnhancedQuestion {
        let unchanged = |reason: &str| {
            tracing::debug!("leaving question as-is: {reason}");
            EnhancedQuestion {
                original_text: text.to_string(),
                enhanced_text: text.to_string(),
                context_type: ContextType::None,
                engagement_score: engagement_score(text, text, ContextType::None, grade),
            }
        };

        if has_story_indicator(text) {
            return unchanged("already framed as a story");
        }
        if !rng.random_bool(enhancement_probability(question_type)) {
            return unchanged("enhancement roll skipped");
        }

        let operands = match extract_operands(text) {
            Ok(operands) => operands,
            Err(reason) => return unchanged(reason),
        };
        let Some(operation) = operation_for(question_type, text, operands.between) else {
            return unchanged("operation not recognized");
        };

        let style = pick_style(grade, rng);
        let Some(template) = templates(operation, style).choose(rng) else {
            return unchanged("no template for style");
        };
        let enhanced_text = fill_template(template, operands.a, operands.b, rng);

        EnhancedQuestion {
            original_text: text.to_string(),
            engagement_score: engagement_score(text, &enhanced_text, style, grade),
            enhanced_text,
            context_type: style,
        }
    }

    /// Fill `ctx.enhanced_questions`, one entry per generated question.
    pub fn enhance<R: Rng + ?Sized>(&self, ctx: &mut WorkflowContext, rng: &mut R) {
        let enhanced: Vec<EnhancedQuestion> = ctx
            .questions
            .iter()
            .map(|q| self.enhance_question(&q.text, ctx.question_type, ctx.grade, rng))
            .collect();

        let changed = enhanced
            .iter()
            .filter(|e| e.context_type != ContextType::None)
            .count();
        tracing::info!(changed, total = enhanced.len(), "context enhancement finished");
        ctx.enhanced_questions = enhanced;
    }
}
