//! Core data model types for quizforge.
//!
//! These are the request-scoped records threaded through the generation
//! pipeline and the grading agent. Everything serializes with camelCase
//! field names since the consumer is a JSON API layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Classifiers
// ---------------------------------------------------------------------------

/// The kind of math practice being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Fractions,
    Decimals,
    WordProblems,
    Mixed,
}

impl QuestionType {
    pub const ALL: [QuestionType; 8] = [
        QuestionType::Addition,
        QuestionType::Subtraction,
        QuestionType::Multiplication,
        QuestionType::Division,
        QuestionType::Fractions,
        QuestionType::Decimals,
        QuestionType::WordProblems,
        QuestionType::Mixed,
    ];

    /// Lowercase, human-readable label used inside prompts.
    pub fn label(&self) -> &'static str {
        match self {
            QuestionType::Addition => "addition",
            QuestionType::Subtraction => "subtraction",
            QuestionType::Multiplication => "multiplication",
            QuestionType::Division => "division",
            QuestionType::Fractions => "fractions",
            QuestionType::Decimals => "decimals",
            QuestionType::WordProblems => "word problems",
            QuestionType::Mixed => "mixed operations",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuestionType::Addition => "ADDITION",
            QuestionType::Subtraction => "SUBTRACTION",
            QuestionType::Multiplication => "MULTIPLICATION",
            QuestionType::Division => "DIVISION",
            QuestionType::Fractions => "FRACTIONS",
            QuestionType::Decimals => "DECIMALS",
            QuestionType::WordProblems => "WORD_PROBLEMS",
            QuestionType::Mixed => "MIXED",
        };
        f.write_str(s)
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "addition" | "add" => Ok(QuestionType::Addition),
            "subtraction" | "subtract" => Ok(QuestionType::Subtraction),
            "multiplication" | "multiply" => Ok(QuestionType::Multiplication),
            "division" | "divide" => Ok(QuestionType::Division),
            "fractions" | "fraction" => Ok(QuestionType::Fractions),
            "decimals" | "decimal" => Ok(QuestionType::Decimals),
            "word_problems" | "word_problem" => Ok(QuestionType::WordProblems),
            "mixed" | "mixed_operations" => Ok(QuestionType::Mixed),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

/// Requested difficulty level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// Ordinal classifier for how involved a question's structure is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    /// Move `steps` notches up (positive) or down (negative), clamped.
    pub fn shift(self, steps: i8) -> Self {
        Self::from_rank(self.rank() + steps)
    }

    pub fn rank(self) -> i8 {
        match self {
            Complexity::Simple => 0,
            Complexity::Moderate => 1,
            Complexity::Complex => 2,
        }
    }

    fn from_rank(rank: i8) -> Self {
        match rank {
            i8::MIN..=0 => Complexity::Simple,
            1 => Complexity::Moderate,
            _ => Complexity::Complex,
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Complexity::Simple => write!(f, "simple"),
            Complexity::Moderate => write!(f, "moderate"),
            Complexity::Complex => write!(f, "complex"),
        }
    }
}

/// Ordinal classifier for how much a student must hold in mind at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CognitiveLoad {
    Low,
    Medium,
    High,
}

impl CognitiveLoad {
    pub fn shift(self, steps: i8) -> Self {
        let rank = match self {
            CognitiveLoad::Low => 0,
            CognitiveLoad::Medium => 1,
            CognitiveLoad::High => 2,
        } + steps;
        match rank {
            i8::MIN..=0 => CognitiveLoad::Low,
            1 => CognitiveLoad::Medium,
            _ => CognitiveLoad::High,
        }
    }
}

impl fmt::Display for CognitiveLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CognitiveLoad::Low => write!(f, "low"),
            CognitiveLoad::Medium => write!(f, "medium"),
            CognitiveLoad::High => write!(f, "high"),
        }
    }
}

/// Framing applied to a question by the context enhancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextType {
    RealWorld,
    Story,
    Visual,
    None,
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextType::RealWorld => write!(f, "real-world"),
            ContextType::Story => write!(f, "story"),
            ContextType::Visual => write!(f, "visual"),
            ContextType::None => write!(f, "none"),
        }
    }
}

/// Which of the two named text-generation backends served a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    Fast,
    HighCapacity,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Fast => write!(f, "fast"),
            Backend::HighCapacity => write!(f, "high-capacity"),
        }
    }
}

// ---------------------------------------------------------------------------
// Generation request / input
// ---------------------------------------------------------------------------

/// A request to generate `count` practice questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub question_type: QuestionType,
    pub difficulty: Difficulty,
    pub grade: u8,
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_count() -> usize {
    5
}

/// Extra prompt directives supplied by structured-prompt callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptDirectives {
    /// Replaces the default system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Theme the questions should revolve around (e.g. "space travel").
    #[serde(default)]
    pub topic: Option<String>,
    /// Free-form lines appended to the constraints section.
    #[serde(default)]
    pub extra_instructions: Vec<String>,
}

/// The two shapes a generation call can arrive in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GenerationInput {
    Standard(GenerationRequest),
    Structured {
        request: GenerationRequest,
        directives: PromptDirectives,
    },
}

impl GenerationInput {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationInput::Standard(_) => "standard",
            GenerationInput::Structured { .. } => "structured",
        }
    }

    /// Split into the request and any directives.
    pub fn into_parts(self) -> (GenerationRequest, Option<PromptDirectives>) {
        match self {
            GenerationInput::Standard(request) => (request, None),
            GenerationInput::Structured {
                request,
                directives,
            } => (request, Some(directives)),
        }
    }
}

impl From<GenerationRequest> for GenerationInput {
    fn from(request: GenerationRequest) -> Self {
        GenerationInput::Standard(request)
    }
}

// ---------------------------------------------------------------------------
// Workflow context
// ---------------------------------------------------------------------------

/// A past question retrieved by vector similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarQuestion {
    pub question: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Relevance in [0, 1].
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumContext {
    pub learning_objectives: Vec<String>,
    pub prerequisite_skills: Vec<String>,
    pub similar_questions: Vec<SimilarQuestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberRange {
    pub min: u32,
    pub max: u32,
}

/// Type-specific upper bounds on individual operands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperandCaps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_divisor: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_factor: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_denominator: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultySettings {
    pub number_range: NumberRange,
    pub complexity: Complexity,
    pub cognitive_load: CognitiveLoad,
    pub allowed_operations: Vec<String>,
    #[serde(default)]
    pub operand_caps: OperandCaps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionMetadata {
    pub model_used: String,
    pub backend: Backend,
    pub generation_time_ms: u64,
    pub vector_context_used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    pub text: String,
    pub answer: f64,
    #[serde(default)]
    pub explanation: Option<String>,
    /// Heuristic confidence in [0, 1].
    pub confidence: f64,
    pub metadata: QuestionMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedQuestion {
    pub original_text: String,
    pub enhanced_text: String,
    pub context_type: ContextType,
    /// Heuristic engagement in [0, 1].
    pub engagement_score: f64,
}

/// Pipeline stage names recorded in `workflow.currentStep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStep {
    Initialized,
    Curriculum,
    Calibration,
    Generation,
    Enhancement,
    Complete,
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowStep::Initialized => "initialized",
            WorkflowStep::Curriculum => "curriculum",
            WorkflowStep::Calibration => "calibration",
            WorkflowStep::Generation => "generation",
            WorkflowStep::Enhancement => "enhancement",
            WorkflowStep::Complete => "complete",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub request_id: Uuid,
    pub current_step: WorkflowStep,
    pub start_time: DateTime<Utc>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Request-scoped record mutated in place by each pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowContext {
    pub question_type: QuestionType,
    pub difficulty: Difficulty,
    pub grade: u8,
    pub count: usize,
    pub curriculum_context: CurriculumContext,
    #[serde(default)]
    pub difficulty_settings: Option<DifficultySettings>,
    pub questions: Vec<GeneratedQuestion>,
    pub enhanced_questions: Vec<EnhancedQuestion>,
    pub workflow: WorkflowState,
}

impl WorkflowContext {
    pub fn new(request: &GenerationRequest) -> Self {
        Self {
            question_type: request.question_type,
            difficulty: request.difficulty,
            grade: request.grade,
            count: request.count,
            curriculum_context: CurriculumContext::default(),
            difficulty_settings: None,
            questions: Vec::new(),
            enhanced_questions: Vec::new(),
            workflow: WorkflowState {
                request_id: Uuid::new_v4(),
                current_step: WorkflowStep::Initialized,
                start_time: Utc::now(),
                errors: Vec::new(),
                warnings: Vec::new(),
            },
        }
    }

    pub fn enter(&mut self, step: WorkflowStep) {
        tracing::debug!(request_id = %self.workflow.request_id, "entering step {step}");
        self.workflow.current_step = step;
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(request_id = %self.workflow.request_id, "{message}");
        self.workflow.warnings.push(message);
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(request_id = %self.workflow.request_id, "{message}");
        self.workflow.errors.push(message);
    }

    pub fn has_vector_context(&self) -> bool {
        !self.curriculum_context.similar_questions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Grading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: String,
    pub question_text: String,
    #[serde(default)]
    pub student_answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    pub session_id: String,
    pub student_id: String,
    #[serde(default)]
    pub student_email: String,
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionGrade {
    pub question_id: String,
    /// Partial credit in [0, 10].
    pub score: f64,
    pub max_score: f64,
    pub feedback: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub total_score: f64,
    pub max_score: f64,
    pub percentage_score: u32,
    pub questions: Vec<QuestionGrade>,
    pub overall_feedback: String,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
}
