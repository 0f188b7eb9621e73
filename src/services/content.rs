//! Loading translated question trees and rendering them for clients.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use serde::Serialize;

use crate::db::Store;
use crate::domain::{MatchSide, QuestionType};
use crate::entities::{answer_translations, answers, question_translations, questions};
use crate::services::catalog::LanguageChain;
use crate::services::scoring::AnswerKey;

/// A question with every translation of itself and its answers.
#[derive(Debug, Clone)]
pub struct LoadedQuestion {
    pub question: questions::Model,
    pub question_type: QuestionType,
    pub translations: Vec<question_translations::Model>,
    pub answers: Vec<LoadedAnswer>,
}

#[derive(Debug, Clone)]
pub struct LoadedAnswer {
    pub answer: answers::Model,
    pub translations: Vec<answer_translations::Model>,
}

impl LoadedQuestion {
    #[must_use]
    pub fn answer_keys(&self) -> Vec<AnswerKey> {
        self.answers.iter().map(|a| AnswerKey::from(&a.answer)).collect()
    }

    #[must_use]
    pub fn content(&self, chain: &LanguageChain) -> (String, Option<String>) {
        chain
            .pick(&self.translations, |t| t.language_id)
            .map(|t| (t.content.clone(), t.explanation.clone()))
            .unwrap_or_default()
    }

    /// Every translation of every correct answer. Text questions accept any of them.
    pub fn accepted_texts(&self) -> impl Iterator<Item = &str> {
        self.answers
            .iter()
            .filter(|a| a.answer.is_correct)
            .flat_map(|a| a.translations.iter().map(|t| t.content.as_str()))
    }

    /// Correct answers in the chosen language, for result pages and fallbacks.
    #[must_use]
    pub fn correct_answer_texts(&self, chain: &LanguageChain) -> Vec<String> {
        match self.question_type {
            QuestionType::Matching => {
                let mut groups: BTreeMap<i32, (Option<String>, Option<String>)> = BTreeMap::new();
                for answer in &self.answers {
                    let Some(group) = answer.answer.match_group else {
                        continue;
                    };
                    let slot = groups.entry(group).or_default();
                    match answer.side() {
                        Some(MatchSide::Left) => slot.0 = Some(answer.content(chain)),
                        Some(MatchSide::Right) => slot.1 = Some(answer.content(chain)),
                        None => {}
                    }
                }
                groups
                    .into_values()
                    .filter_map(|(left, right)| Some(format!("{} = {}", left?, right?)))
                    .collect()
            }
            _ => self
                .answers
                .iter()
                .filter(|a| a.answer.is_correct)
                .map(|a| a.content(chain))
                .collect(),
        }
    }
}

impl LoadedAnswer {
    #[must_use]
    pub fn content(&self, chain: &LanguageChain) -> String {
        chain
            .pick(&self.translations, |t| t.language_id)
            .map(|t| t.content.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn side(&self) -> Option<MatchSide> {
        self.answer.match_side.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Loads the questions of a test with all their answers and translations,
/// ordered by position.
pub async fn load_questions(
    store: &Store,
    test_id: i32,
    active_only: bool,
) -> Result<Vec<LoadedQuestion>> {
    let quizzes = store.quizzes();
    let questions = quizzes.questions_for_test(test_id, active_only).await?;
    assemble(store, questions).await
}

pub async fn load_question(store: &Store, question_id: i32) -> Result<Option<LoadedQuestion>> {
    let Some(question) = store.quizzes().get_question(question_id).await? else {
        return Ok(None);
    };
    Ok(assemble(store, vec![question]).await?.into_iter().next())
}

async fn assemble(store: &Store, questions: Vec<questions::Model>) -> Result<Vec<LoadedQuestion>> {
    let quizzes = store.quizzes();
    let question_ids: Vec<i32> = questions.iter().map(|q| q.id).collect();

    let mut question_translations = group_by(
        quizzes.question_translations_for(&question_ids).await?,
        |t| t.question_id,
    );

    let answers = quizzes.answers_for_questions(&question_ids).await?;
    let answer_ids: Vec<i32> = answers.iter().map(|a| a.id).collect();
    let mut answer_translations = group_by(
        quizzes.answer_translations_for(&answer_ids).await?,
        |t| t.answer_id,
    );

    let mut answers_by_question: HashMap<i32, Vec<LoadedAnswer>> = HashMap::new();
    for answer in answers {
        let translations = answer_translations.remove(&answer.id).unwrap_or_default();
        answers_by_question
            .entry(answer.question_id)
            .or_default()
            .push(LoadedAnswer {
                answer,
                translations,
            });
    }

    let loaded = questions
        .into_iter()
        .filter_map(|question| {
            let question_type = question.question_type.parse().ok()?;
            Some(LoadedQuestion {
                question_type,
                translations: question_translations
                    .remove(&question.id)
                    .unwrap_or_default(),
                answers: answers_by_question
                    .remove(&question.id)
                    .unwrap_or_default(),
                question,
            })
        })
        .collect();

    Ok(loaded)
}

fn group_by<T>(rows: Vec<T>, key: impl Fn(&T) -> i32) -> HashMap<i32, Vec<T>> {
    let mut grouped: HashMap<i32, Vec<T>> = HashMap::new();
    for row in rows {
        grouped.entry(key(&row)).or_default().push(row);
    }
    grouped
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: i32,
    pub question_type: QuestionType,
    pub position: i32,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub answers: Vec<AnswerView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerView {
    pub id: i32,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_side: Option<MatchSide>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_group: Option<i32>,
}

impl QuestionView {
    /// With `reveal` unset, correctness, match groups, explanations and the
    /// accepted answers of text questions are left out.
    #[must_use]
    pub fn render(loaded: &LoadedQuestion, chain: &LanguageChain, reveal: bool) -> Self {
        let (content, explanation) = loaded.content(chain);

        let answers = if loaded.question_type == QuestionType::Text && !reveal {
            Vec::new()
        } else {
            loaded
                .answers
                .iter()
                .map(|a| AnswerView {
                    id: a.answer.id,
                    content: a.content(chain),
                    is_correct: reveal.then_some(a.answer.is_correct),
                    match_side: a.side(),
                    match_group: if reveal { a.answer.match_group } else { None },
                })
                .collect()
        };

        Self {
            id: loaded.question.id,
            question_type: loaded.question_type,
            position: loaded.question.position,
            content,
            explanation: if reveal { explanation } else { None },
            answers,
        }
    }
}
