use thiserror::Error;

use crate::definition::DefinitionError;
use crate::error::RugradeError;
use crate::grader::matcher::MatchError;
use crate::http::{TransportError, UnsupportedMethod};
use crate::result::ProjectResult;

/// 单个节点内的错误：节点记为 Failed，不向上抛出
#[derive(Debug, Error)]
pub enum GradeError {
    #[error(transparent)]
    UnsupportedMethod(#[from] UnsupportedMethod),

    #[error("request failed: {0}")]
    RequestFailed(#[from] TransportError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("failed to load definitions: {0}")]
    Definition(#[from] DefinitionError),
}

/// 整次评测被中止
///
/// `partial` 是中止时已经得到的结果树（如果项目结果行已创建）。
#[derive(Debug, Error)]
#[error("grading run aborted: {reason}")]
pub struct RunAborted {
    pub reason: RugradeError,
    pub partial: Option<ProjectResult>,
}

impl RunAborted {
    pub fn new(reason: impl Into<RugradeError>) -> Self {
        Self {
            reason: reason.into(),
            partial: None,
        }
    }

    pub fn with_partial(mut self, partial: ProjectResult) -> Self {
        self.partial = Some(partial);
        self
    }
}
