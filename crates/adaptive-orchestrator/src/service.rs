//! The diagnostic service: follow-up generation, submission, and
//! personalization over a reasoning service and an optional content store.

use std::sync::Arc;

use adaptive_store::{ContentStore, CourseContent, CourseRecord, NewCourse};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::diagnostic::{
    DiagnosticResult, FollowUpRequest, GeneratedCourse, LessonFeedback, SubmissionOutcome,
    SubmissionRequest,
};
use crate::error::{AdaptiveError, Result};
use crate::flight::SingleFlight;
use crate::reasoning::{
    diagnosis_prompt, follow_up_prompt, parse_diagnosis, parse_follow_ups, parse_lesson,
    parse_syllabus, personalization_prompt, syllabus_prompt, ReasoningRequest, ReasoningService,
};
use crate::retry::RetryPolicy;

/// Implements the diagnostic contracts.
///
/// Every reasoning call goes through the retry policy. Without a store,
/// generated courses are returned unsaved and personalization is refused.
pub struct DiagnosticService {
    reasoning: Arc<dyn ReasoningService>,
    store: Option<Arc<dyn ContentStore>>,
    retry: RetryPolicy,
    max_followups: usize,
    personalizing: SingleFlight<Uuid>,
}

impl std::fmt::Debug for DiagnosticService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticService")
            .field("has_store", &self.store.is_some())
            .field("retry", &self.retry)
            .field("max_followups", &self.max_followups)
            .finish_non_exhaustive()
    }
}

impl DiagnosticService {
    /// Creates a service.
    #[must_use]
    pub fn new(
        reasoning: Arc<dyn ReasoningService>,
        store: Option<Arc<dyn ContentStore>>,
        retry: RetryPolicy,
        max_followups: usize,
    ) -> Self {
        Self {
            reasoning,
            store,
            retry,
            max_followups,
            personalizing: SingleFlight::new(),
        }
    }

    /// Creates a service using the retry and interview sections of `config`.
    #[must_use]
    pub fn from_config(
        config: &Config,
        reasoning: Arc<dyn ReasoningService>,
        store: Option<Arc<dyn ContentStore>>,
    ) -> Self {
        Self::new(
            reasoning,
            store,
            RetryPolicy::from_config(&config.retry, &config.reasoning),
            config.interview.max_followups,
        )
    }

    /// Returns the cap on follow-up questions.
    #[must_use]
    pub const fn max_followups(&self) -> usize {
        self.max_followups
    }

    /// Returns `true` if a content store is configured.
    #[must_use]
    pub const fn has_store(&self) -> bool {
        self.store.is_some()
    }

    fn store(&self) -> Result<&Arc<dyn ContentStore>> {
        self.store.as_ref().ok_or(AdaptiveError::StoreUnavailable)
    }

    async fn ask(&self, request: ReasoningRequest) -> Result<String> {
        let operation = request.kind.to_string();
        self.retry
            .run(&operation, || self.reasoning.complete(request.clone()))
            .await
    }

    /// Generates topic-specific follow-up questions.
    ///
    /// The result may be empty; callers decide how to fall back.
    ///
    /// # Errors
    ///
    /// Returns [`AdaptiveError::InvalidRequest`] for a missing topic or skill
    /// level, or the reasoning error if generation failed.
    #[instrument(skip(self, request), fields(topic = %request.topic, language = %request.language))]
    pub async fn follow_up_questions(&self, request: &FollowUpRequest) -> Result<Vec<String>> {
        request.validate()?;
        let reply = self.ask(follow_up_prompt(request, self.max_followups)).await?;
        let questions = parse_follow_ups(&reply, self.max_followups)?;
        info!(count = questions.len(), "Follow-up questions generated");
        Ok(questions)
    }

    /// Diagnoses a completed interview and generates one course per topic.
    ///
    /// Topics whose syllabus cannot be generated are skipped. Courses are
    /// saved when an owner and a store are present; a failed save keeps the
    /// unsaved content in the outcome.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad response list, or the reasoning
    /// error if the diagnosis itself failed.
    #[instrument(skip(self, request), fields(responses = request.responses.len(), language = %request.language))]
    pub async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionOutcome> {
        request.validate(self.max_followups)?;

        let reply = self
            .ask(diagnosis_prompt(&request.responses, &request.language))
            .await?;
        let diagnostic = parse_diagnosis(&reply)?.coerce();
        info!(
            skill_level = %diagnostic.skill_level,
            style = %diagnostic.style_preference,
            topics = diagnostic.recommended_topics.len(),
            "Diagnosis complete"
        );

        let owner = request.owner();
        let mut courses = Vec::with_capacity(diagnostic.recommended_topics.len());
        for topic in &diagnostic.recommended_topics {
            match self.generate_syllabus(topic, &diagnostic, &request.language).await {
                Ok(content) => courses.push(self.save(owner, &diagnostic, content).await),
                Err(e) => warn!(%topic, error = %e, "Skipping topic, syllabus generation failed"),
            }
        }

        info!(courses = courses.len(), "Submission processed");
        Ok(SubmissionOutcome {
            diagnostic,
            courses,
        })
    }

    async fn generate_syllabus(
        &self,
        topic: &str,
        diagnostic: &DiagnosticResult,
        language: &str,
    ) -> Result<CourseContent> {
        let reply = self
            .ask(syllabus_prompt(
                topic,
                diagnostic.skill_level,
                diagnostic.style_preference,
                language,
            ))
            .await?;
        let content = parse_syllabus(&reply)?;
        debug!(%topic, title = %content.title, modules = content.modules.len(), "Syllabus generated");
        Ok(content)
    }

    async fn save(
        &self,
        owner: Option<&str>,
        diagnostic: &DiagnosticResult,
        content: CourseContent,
    ) -> GeneratedCourse {
        let (Some(user_id), Some(store)) = (owner, self.store.as_ref()) else {
            return GeneratedCourse::Unsaved(content);
        };

        let course = NewCourse::new(
            user_id,
            diagnostic.skill_level,
            diagnostic.style_preference,
            content.clone(),
        );
        match store.insert_course(course).await {
            Ok(record) => GeneratedCourse::Saved(record),
            Err(e) => {
                warn!(%user_id, title = %content.title, error = %e, "Failed to save course, returning it unsaved");
                GeneratedCourse::Unsaved(content)
            }
        }
    }

    /// Rewrites one module of a stored course from learner feedback.
    ///
    /// Only the target module's content changes; any failure leaves the
    /// stored course untouched.
    ///
    /// # Errors
    ///
    /// Returns [`AdaptiveError::StoreUnavailable`] without a store,
    /// [`AdaptiveError::Busy`] if the course is already being personalized,
    /// [`AdaptiveError::CourseNotFound`], [`AdaptiveError::ModuleOutOfBounds`],
    /// or the reasoning or store error.
    #[instrument(skip(self, request), fields(course_id = %request.course_id, module = request.module_index))]
    pub async fn personalize(&self, request: &LessonFeedback) -> Result<CourseRecord> {
        let store = self.store()?;
        let _flight = self
            .personalizing
            .try_acquire(request.course_id)
            .ok_or_else(|| AdaptiveError::busy("Personalization of this course"))?;

        let course = store.get_course(request.course_id).await?;
        let count = course.content.modules.len();
        let module = course
            .content
            .modules
            .get(request.module_index)
            .ok_or(AdaptiveError::ModuleOutOfBounds {
                index: request.module_index,
                count,
            })?;

        let reply = self
            .ask(personalization_prompt(
                &module.title,
                &module.content,
                &request.feedback,
                &request.language,
            ))
            .await?;
        let lesson = parse_lesson(&reply)?;

        let updated = course
            .content
            .with_module_content(request.module_index, lesson)
            .ok_or(AdaptiveError::ModuleOutOfBounds {
                index: request.module_index,
                count,
            })?;
        let record = store.update_content(course.id, updated).await?;
        info!("Module personalized");
        Ok(record)
    }

    /// Lists a user's courses, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AdaptiveError::StoreUnavailable`] without a store, or the
    /// store error.
    pub async fn courses_for(&self, user_id: &str) -> Result<Vec<CourseRecord>> {
        if user_id.trim().is_empty() {
            return Err(AdaptiveError::invalid_request("Missing userId"));
        }
        Ok(self.store()?.courses_for_user(user_id.trim()).await?)
    }

    /// Fetches one stored course.
    ///
    /// # Errors
    ///
    /// Returns [`AdaptiveError::StoreUnavailable`] without a store, or
    /// [`AdaptiveError::CourseNotFound`].
    pub async fn course(&self, id: Uuid) -> Result<CourseRecord> {
        Ok(self.store()?.get_course(id).await?)
    }
}
