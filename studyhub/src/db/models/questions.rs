//! Database models for questions and answers, plus the question search filter.

use crate::types::{AnswerId, GradeLevel, QuestionId, UserId};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct QuestionCreateDBRequest {
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    pub subject: String,
    pub grade_level: GradeLevel,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QuestionDBResponse {
    pub id: QuestionId,
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    pub subject: String,
    pub grade_level: GradeLevel,
    pub tags: Vec<String>,
    pub votes: i32,
    pub answer_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AnswerCreateDBRequest {
    pub question_id: QuestionId,
    pub user_id: UserId,
    pub content: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnswerDBResponse {
    pub id: AnswerId,
    pub question_id: QuestionId,
    pub user_id: UserId,
    pub content: String,
    pub votes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for listing questions.
///
/// `search` is a case-insensitive substring match over title, content and
/// every tag. `subject` is an exact, case-sensitive match.
#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    pub search: Option<String>,
    pub subject: Option<String>,
}

impl QuestionFilter {
    /// Build a filter from raw query input. Blank search terms and the
    /// `all` subject mean "no filter".
    pub fn new(search: Option<String>, subject: Option<String>) -> Self {
        Self {
            search: normalize_search(search),
            subject: normalize_subject(subject),
        }
    }

    pub fn matches(&self, question: &QuestionDBResponse) -> bool {
        if let Some(subject) = &self.subject
            && question.subject != *subject
        {
            return false;
        }
        match &self.search {
            None => true,
            Some(term) => {
                contains_ci(&question.title, term)
                    || contains_ci(&question.content, term)
                    || question.tags.iter().any(|tag| contains_ci(tag, term))
            }
        }
    }
}

/// Lowercase and trim a search term, dropping it when blank.
pub(crate) fn normalize_search(search: Option<String>) -> Option<String> {
    search.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty())
}

pub(crate) fn normalize_subject(subject: Option<String>) -> Option<String> {
    subject.filter(|s| !s.is_empty() && s != "all")
}

/// Case-insensitive substring test. `term` must already be lowercase.
pub(crate) fn contains_ci(haystack: &str, term: &str) -> bool {
    haystack.to_lowercase().contains(term)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn question(title: &str, content: &str, subject: &str, tags: &[&str]) -> QuestionDBResponse {
        QuestionDBResponse {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: title.to_string(),
            content: content.to_string(),
            subject: subject.to_string(),
            grade_level: GradeLevel::High,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            votes: 0,
            answer_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_subject_filter_is_exact() {
        let filter = QuestionFilter::new(None, Some("Math".to_string()));
        assert!(filter.matches(&question("Limits", "", "Math", &[])));
        assert!(!filter.matches(&question("Limits", "", "math", &[])));
        assert!(!filter.matches(&question("Limits", "", "Mathematics", &[])));
    }

    #[test]
    fn test_search_is_case_insensitive_over_title_content_and_tags() {
        let filter = QuestionFilter::new(Some("DERIV".to_string()), None);
        assert!(filter.matches(&question("What is a derivative?", "", "Math", &[])));
        assert!(filter.matches(&question("Help", "Explain derivatives please", "Math", &[])));
        assert!(filter.matches(&question("Help", "", "Math", &["calculus", "Derivation"])));
        assert!(!filter.matches(&question("Help", "integrals", "Math", &["calculus"])));
    }

    #[test]
    fn test_blank_filters_match_everything() {
        let filter = QuestionFilter::new(Some("   ".to_string()), Some("all".to_string()));
        assert!(filter.search.is_none());
        assert!(filter.subject.is_none());
        assert!(filter.matches(&question("Anything", "", "History", &[])));
    }

    #[test]
    fn test_search_and_subject_combine() {
        let filter = QuestionFilter::new(Some("cell".to_string()), Some("Biology".to_string()));
        assert!(filter.matches(&question("Cell walls", "", "Biology", &[])));
        assert!(!filter.matches(&question("Cell walls", "", "Chemistry", &[])));
        assert!(!filter.matches(&question("Photosynthesis", "", "Biology", &[])));
    }
}
