//! Curriculum analysis: vector-context retrieval plus static learning
//! objectives and prerequisite skills.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::instrument;

use crate::calibration::clamp_grade;
use crate::model::{Difficulty, QuestionType, SimilarQuestion, WorkflowContext};
use crate::traits::{Embedder, SearchFilter, SearchQuery, VectorSearch};

pub const DEFAULT_TOP_K: usize = 5;

/// Learning objectives and prerequisites for one (grade, type) cell.
#[derive(Debug, Clone, Copy)]
struct CurriculumEntry {
    grade: u8,
    question_type: QuestionType,
    objectives: &'static [&'static str],
    prerequisites: &'static [&'static str],
}

const fn entry(
    grade: u8,
    question_type: QuestionType,
    objectives: &'static [&'static str],
    prerequisites: &'static [&'static str],
) -> CurriculumEntry {
    CurriculumEntry {
        grade,
        question_type,
        objectives,
        prerequisites,
    }
}

static CURRICULUM: &[CurriculumEntry] = &[
    entry(
        1,
        QuestionType::Addition,
        &["Add within 20 using objects and drawings", "Understand addition as putting together"],
        &["Counting to 20", "Recognizing numerals"],
    ),
    entry(
        1,
        QuestionType::Subtraction,
        &["Subtract within 20", "Understand subtraction as taking apart"],
        &["Counting backwards from 20", "Comparing quantities"],
    ),
    entry(
        2,
        QuestionType::Addition,
        &["Fluently add within 100", "Use place value to add two-digit numbers"],
        &["Addition facts within 20", "Understanding tens and ones"],
    ),
    entry(
        2,
        QuestionType::Subtraction,
        &["Fluently subtract within 100", "Relate subtraction to addition"],
        &["Subtraction facts within 20", "Understanding tens and ones"],
    ),
    entry(
        3,
        QuestionType::Addition,
        &["Add within 1000 using place value", "Solve two-step addition problems"],
        &["Two-digit addition", "Place value to hundreds"],
    ),
    entry(
        3,
        QuestionType::Multiplication,
        &["Multiply within 100", "Interpret products as equal groups"],
        &["Skip counting", "Repeated addition"],
    ),
    entry(
        3,
        QuestionType::Division,
        &["Divide within 100", "Interpret quotients as equal shares"],
        &["Multiplication facts", "Equal grouping"],
    ),
    entry(
        3,
        QuestionType::Fractions,
        &["Understand unit fractions", "Compare fractions with the same denominator"],
        &["Equal parts of a whole", "Division as sharing"],
    ),
    entry(
        4,
        QuestionType::Multiplication,
        &["Multiply up to four digits by one digit", "Multiply two two-digit numbers"],
        &["Multiplication facts to 10x10", "Place value to thousands"],
    ),
    entry(
        4,
        QuestionType::Division,
        &["Divide up to four-digit dividends by one-digit divisors", "Interpret remainders"],
        &["Multiplication facts to 10x10", "Subtraction with regrouping"],
    ),
    entry(
        4,
        QuestionType::Fractions,
        &["Recognize equivalent fractions", "Add and subtract like fractions"],
        &["Unit fractions", "Multiplication facts"],
    ),
    entry(
        4,
        QuestionType::Decimals,
        &["Relate decimals to fractions with denominators 10 and 100", "Compare decimals to hundredths"],
        &["Fractions with denominator 10", "Place value"],
    ),
    entry(
        5,
        QuestionType::Fractions,
        &["Add and subtract fractions with unlike denominators", "Multiply fractions by whole numbers"],
        &["Equivalent fractions", "Common multiples"],
    ),
    entry(
        5,
        QuestionType::Decimals,
        &["Add, subtract, multiply, and divide decimals to hundredths", "Round decimals"],
        &["Place value to thousandths", "Whole-number operations"],
    ),
    entry(
        5,
        QuestionType::WordProblems,
        &["Solve multi-step problems with whole numbers", "Write expressions for word problems"],
        &["All four operations", "Reading comprehension"],
    ),
    entry(
        6,
        QuestionType::Fractions,
        &["Divide fractions by fractions", "Apply ratio reasoning"],
        &["Multiplying fractions", "Reciprocals"],
    ),
    entry(
        6,
        QuestionType::Mixed,
        &["Apply order of operations", "Evaluate numerical expressions with exponents"],
        &["All four operations", "Parentheses"],
    ),
    entry(
        8,
        QuestionType::Mixed,
        &["Work with large numbers and scientific notation", "Solve linear equations"],
        &["Order of operations", "Integer arithmetic"],
    ),
    entry(
        8,
        QuestionType::WordProblems,
        &["Model real situations with linear equations", "Interpret rates of change"],
        &["Proportional relationships", "Solving one-variable equations"],
    ),
];

/// Keyword phrase embedded for each question type.
fn search_phrase_for(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::Addition => "addition sum add plus total",
        QuestionType::Subtraction => "subtraction difference minus take away",
        QuestionType::Multiplication => "multiplication times product groups of",
        QuestionType::Division => "division divide quotient share equally",
        QuestionType::Fractions => "fractions numerator denominator parts of a whole",
        QuestionType::Decimals => "decimals decimal point tenths hundredths",
        QuestionType::WordProblems => "word problems story math real life",
        QuestionType::Mixed => "mixed operations arithmetic order of operations",
    }
}

/// Build the similarity-search phrase for a request.
pub fn build_search_phrase(question_type: QuestionType, grade: u8, difficulty: Difficulty) -> String {
    format!(
        "{} grade {} {}",
        search_phrase_for(question_type),
        grade,
        difficulty
    )
}

/// Objectives and prerequisites for a (grade, type) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurriculumMetadata {
    pub learning_objectives: Vec<String>,
    pub prerequisite_skills: Vec<String>,
}

/// Look up static curriculum metadata.
///
/// A grade without any entries falls back to the nearest grade that has some
/// (ties go to the lower grade). A type missing at that grade gets a generic
/// objective and no prerequisites.
pub fn curriculum_metadata(grade: u8, question_type: QuestionType) -> CurriculumMetadata {
    let grade = clamp_grade(grade);
    let resolved_grade = CURRICULUM
        .iter()
        .map(|e| e.grade)
        .min_by_key(|g| (g.abs_diff(grade), *g))
        .unwrap_or(grade);

    match CURRICULUM
        .iter()
        .find(|e| e.grade == resolved_grade && e.question_type == question_type)
    {
        Some(e) => CurriculumMetadata {
            learning_objectives: e.objectives.iter().map(|s| s.to_string()).collect(),
            prerequisite_skills: e.prerequisites.iter().map(|s| s.to_string()).collect(),
        },
        None => CurriculumMetadata {
            learning_objectives: vec![format!("Practice {} skills", question_type.label())],
            prerequisite_skills: Vec::new(),
        },
    }
}

/// Fill objectives and prerequisites without touching retrieved examples.
pub fn apply_curriculum_metadata(ctx: &mut WorkflowContext) {
    let metadata = curriculum_metadata(ctx.grade, ctx.question_type);
    ctx.curriculum_context.learning_objectives = metadata.learning_objectives;
    ctx.curriculum_context.prerequisite_skills = metadata.prerequisite_skills;
}

/// Maps a request to retrieved examples and curriculum metadata.
pub struct CurriculumAnalyzer {
    embedder: Arc<dyn Embedder>,
    search: Arc<dyn VectorSearch>,
    top_k: usize,
}

impl CurriculumAnalyzer {
    pub fn new(embedder: Arc<dyn Embedder>, search: Arc<dyn VectorSearch>) -> Self {
        Self {
            embedder,
            search,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Populate `ctx.curriculum_context`. Retrieval failures degrade to an
    /// empty example list and a warning.
    #[instrument(skip(self, ctx), fields(question_type = %ctx.question_type, grade = ctx.grade))]
    pub async fn analyze(&self, ctx: &mut WorkflowContext) {
        apply_curriculum_metadata(ctx);

        match self
            .retrieve_similar(ctx.question_type, ctx.grade, ctx.difficulty)
            .await
        {
            Ok(similar) => {
                tracing::info!("retrieved {} similar questions", similar.len());
                ctx.curriculum_context.similar_questions = similar;
            }
            Err(e) => {
                ctx.curriculum_context.similar_questions.clear();
                ctx.warn(format!("vector search unavailable, continuing without examples: {e:#}"));
            }
        }
    }

    /// Embed the search phrase and fetch the top-K neighbors.
    pub async fn retrieve_similar(
        &self,
        question_type: QuestionType,
        grade: u8,
        difficulty: Difficulty,
    ) -> Result<Vec<SimilarQuestion>> {
        let phrase = build_search_phrase(question_type, grade, difficulty);
        tracing::debug!(phrase = %phrase, embedder = self.embedder.name(), "embedding search phrase");

        let vector = self
            .embedder
            .embed(&phrase)
            .await
            .context("failed to embed search phrase")?;

        let query = SearchQuery {
            vector,
            limit: self.top_k,
            filter: SearchFilter {
                question_type: Some(question_type),
                grade: Some(grade),
            },
        };
        let hits = self
            .search
            .search(&query)
            .await
            .with_context(|| format!("similarity search via {} failed", self.search.name()))?;

        let mut similar: Vec<SimilarQuestion> = hits
            .into_iter()
            .filter(|hit| !hit.text.trim().is_empty())
            .map(|hit| SimilarQuestion {
                question: hit.text,
                explanation: hit.explanation.filter(|e| !e.trim().is_empty()),
                question_type: hit.question_type.unwrap_or(question_type),
                score: if hit.score.is_finite() {
                    hit.score.clamp(0.0, 1.0)
                } else {
                    0.0
                },
            })
            .collect();
        similar.sort_by(|a, b| b.score.total_cmp(&a.score));
        similar.truncate(self.top_k);
        Ok(similar)
    }
}
