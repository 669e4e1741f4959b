use std::time::Duration;

use crate::definition::RequestTemplate;
use crate::http::{Method, Request, UnsupportedMethod};
use crate::variable::{VariableResolver, VariableStore};

/// 由请求模板和当前变量物化出具体请求
pub struct RequestBuilder;

impl RequestBuilder {
    /// 方法在任何替换和网络活动之前校验。
    /// body 作为不透明文本替换，不做 JSON 解析。
    pub fn build(
        template: &RequestTemplate,
        base_url: &str,
        variables: &VariableStore,
    ) -> Result<Request, UnsupportedMethod> {
        let method: Method = template.method.parse()?;

        // 先拼接再替换，变量里可以带路径
        let url = format!("{}{}", base_url, template.url);
        let url = VariableResolver::substitute(&url, variables);
        let mut request = Request::new(method, url);

        for header in &template.headers {
            request = request.with_header(
                VariableResolver::substitute(&header.key, variables),
                VariableResolver::substitute(&header.value, variables),
            );
        }

        if !template.body.is_empty() {
            request = request.with_body(VariableResolver::substitute(&template.body, variables));
        }

        if let Some(secs) = template.timeout_secs {
            request = request.with_timeout(Duration::from_secs(secs));
        }

        Ok(request)
    }
}
