//! Deterministic difficulty calibration.
//!
//! Maps (question type, grade, difficulty) to a numeric range, operand caps,
//! complexity / cognitive-load classifiers, and the operations a question may
//! use. No I/O, no randomness; the same inputs always give the same settings.

use crate::model::{
    CognitiveLoad, Complexity, Difficulty, DifficultySettings, NumberRange, OperandCaps,
    QuestionType, WorkflowContext,
};

pub const MIN_GRADE: u8 = 1;
pub const MAX_GRADE: u8 = 8;

/// Upper bound of the base range for grades 1 through 8.
const BASE_MAX_BY_GRADE: [u32; 8] = [10, 10, 10, 100, 500, 1000, 1000, 2000];

/// Hard ceiling on divisors, factors, and denominators.
const OPERAND_CEILING: u32 = 12;

/// Operation markers that need place-value fluency grade 3 onwards.
const ADVANCED_MARKERS: [&str; 4] = ["multi-digit", "carrying", "borrowing", "regrouping"];

pub fn clamp_grade(grade: u8) -> u8 {
    grade.clamp(MIN_GRADE, MAX_GRADE)
}

fn difficulty_multiplier(difficulty: Difficulty) -> f64 {
    match difficulty {
        Difficulty::Easy => 0.5,
        Difficulty::Medium => 0.75,
        Difficulty::Hard => 1.0,
    }
}

fn difficulty_shift(difficulty: Difficulty) -> i8 {
    match difficulty {
        Difficulty::Easy => -1,
        Difficulty::Medium => 0,
        Difficulty::Hard => 1,
    }
}

/// Starting classifiers before grade and difficulty adjustments.
fn base_classifiers(question_type: QuestionType) -> (Complexity, CognitiveLoad) {
    match question_type {
        QuestionType::Addition | QuestionType::Subtraction => {
            (Complexity::Simple, CognitiveLoad::Low)
        }
        QuestionType::Multiplication | QuestionType::Division | QuestionType::Decimals => {
            (Complexity::Moderate, CognitiveLoad::Medium)
        }
        QuestionType::Mixed => (Complexity::Moderate, CognitiveLoad::High),
        QuestionType::Fractions | QuestionType::WordProblems => {
            (Complexity::Complex, CognitiveLoad::High)
        }
    }
}

fn operations_for(question_type: QuestionType) -> &'static [&'static str] {
    match question_type {
        QuestionType::Addition => &[
            "single-digit addition",
            "adding three numbers",
            "multi-digit addition",
            "addition with carrying",
        ],
        QuestionType::Subtraction => &[
            "single-digit subtraction",
            "finding the difference",
            "multi-digit subtraction",
            "subtraction with borrowing",
        ],
        QuestionType::Multiplication => &[
            "times tables",
            "multiplying by 10",
            "multi-digit multiplication",
            "multiplication with regrouping",
        ],
        QuestionType::Division => &[
            "equal sharing",
            "division facts",
            "division with remainders",
            "multi-digit division",
        ],
        QuestionType::Fractions => &[
            "identifying fractions",
            "comparing fractions",
            "adding like fractions",
            "equivalent fractions",
        ],
        QuestionType::Decimals => &[
            "reading decimals",
            "adding decimals",
            "subtracting decimals",
            "multi-digit decimal arithmetic",
        ],
        QuestionType::WordProblems => &[
            "one-step word problems",
            "two-step word problems",
            "multi-digit word problems",
        ],
        QuestionType::Mixed => &[
            "addition",
            "subtraction",
            "multiplication",
            "division",
            "order of operations",
        ],
    }
}

fn number_range(grade: u8, difficulty: Difficulty) -> NumberRange {
    let base_max = BASE_MAX_BY_GRADE[usize::from(clamp_grade(grade) - MIN_GRADE)];
    let min = 1;
    let scaled = (f64::from(base_max) * difficulty_multiplier(difficulty)).floor() as u32;
    NumberRange {
        min,
        max: scaled.max(min),
    }
}

fn operand_caps(question_type: QuestionType, grade: u8, range: NumberRange) -> OperandCaps {
    let mut caps = OperandCaps::default();
    match question_type {
        QuestionType::Division => {
            caps.max_divisor = Some((range.max / 4).clamp(1, OPERAND_CEILING));
        }
        QuestionType::Multiplication => {
            let root = f64::from(range.max).sqrt().floor() as u32;
            caps.max_factor = Some(root.clamp(1, OPERAND_CEILING));
        }
        QuestionType::Fractions => {
            let denominator = u32::from(clamp_grade(grade)) + 4;
            caps.max_denominator = Some(denominator.clamp(2, OPERAND_CEILING));
        }
        _ => {}
    }
    caps
}

fn classifiers(
    question_type: QuestionType,
    grade: u8,
    difficulty: Difficulty,
) -> (Complexity, CognitiveLoad) {
    let (mut complexity, mut load) = base_classifiers(question_type);
    let grade = clamp_grade(grade);

    if grade <= 2 {
        complexity = Complexity::Simple;
        load = CognitiveLoad::Low;
    } else if grade >= 6 {
        complexity = complexity.max(Complexity::Moderate);
        load = load.max(CognitiveLoad::Medium);
    }

    let shift = difficulty_shift(difficulty);
    (complexity.shift(shift), load.shift(shift))
}

fn allowed_operations(question_type: QuestionType, grade: u8, difficulty: Difficulty) -> Vec<String> {
    let all = operations_for(question_type);

    let mut ops: Vec<&str> = if clamp_grade(grade) < 3 {
        all.iter()
            .copied()
            .filter(|op| !ADVANCED_MARKERS.iter().any(|marker| op.contains(marker)))
            .collect()
    } else {
        all.to_vec()
    };
    if ops.is_empty() {
        ops.push(all[0]);
    }

    let keep = match difficulty {
        Difficulty::Easy => 1,
        Difficulty::Medium => 2,
        Difficulty::Hard => ops.len(),
    };
    ops.truncate(keep);
    ops.into_iter().map(String::from).collect()
}

/// Compute age-appropriate settings for a question batch.
pub fn calibrate(question_type: QuestionType, grade: u8, difficulty: Difficulty) -> DifficultySettings {
    let range = number_range(grade, difficulty);
    let (complexity, cognitive_load) = classifiers(question_type, grade, difficulty);

    DifficultySettings {
        number_range: range,
        complexity,
        cognitive_load,
        allowed_operations: allowed_operations(question_type, grade, difficulty),
        operand_caps: operand_caps(question_type, grade, range),
    }
}

/// Pipeline stage wrapper around [`calibrate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DifficultyCalibrator;

impl DifficultyCalibrator {
    pub fn new() -> Self {
        Self
    }

    pub fn calibrate(&self, ctx: &mut WorkflowContext) {
        if clamp_grade(ctx.grade) != ctx.grade {
            ctx.warn(format!(
                "grade {} outside {MIN_GRADE}..={MAX_GRADE}, calibrating as grade {}",
                ctx.grade,
                clamp_grade(ctx.grade)
            ));
        }
        let settings = calibrate(ctx.question_type, ctx.grade, ctx.difficulty);
        tracing::info!(
            min = settings.number_range.min,
            max = settings.number_range.max,
            complexity = %settings.complexity,
            load = %settings.cognitive_load,
            "difficulty calibrated"
        );
        ctx.difficulty_settings = Some(settings);
    }
}
