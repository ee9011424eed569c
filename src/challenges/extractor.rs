//! Credential extraction from a cleared session.

use url::Url;

use crate::challenges::core::{RenderedSession, SessionCookie, SessionCredentials, SessionError};

/// Reads the cookie header and user agent a downstream client needs to reuse
/// the clearance.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionExtractor;

impl SessionExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Cookie read failures propagate; a failed user-agent read yields `""`.
    pub async fn extract(
        &self,
        session: &mut dyn RenderedSession,
        origin: &Url,
    ) -> Result<SessionCredentials, SessionError> {
        let cookies = session.cookies(origin).await?;
        let user_agent = match session.user_agent().await {
            Ok(user_agent) => user_agent,
            Err(err) => {
                log::debug!("user agent unavailable: {err}");
                String::new()
            }
        };

        Ok(SessionCredentials {
            cookie_header: cookie_header(&cookies),
            user_agent,
        })
    }
}

/// Join cookies as `name=value` pairs separated by `"; "`, keeping jar order.
pub fn cookie_header(cookies: &[SessionCookie]) -> String {
    cookies
        .iter()
        .map(|cookie| format!("{}={}", cookie.name, cookie.value))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::challenges::core::{RawResponse, SessionRequest};

    struct JarSession {
        cookies: Result<Vec<SessionCookie>, ()>,
        user_agent: Result<String, ()>,
        asked_for: Option<Url>,
    }

    #[async_trait]
    impl RenderedSession for JarSession {
        async fn navigate(&mut self, _url: &Url) -> Result<(), SessionError> {
            Ok(())
        }

        async fn request(&mut self, request: &SessionRequest) -> Result<RawResponse, SessionError> {
            Err(SessionError::request(&request.url, "not scripted"))
        }

        async fn cookies(&mut self, origin: &Url) -> Result<Vec<SessionCookie>, SessionError> {
            self.asked_for = Some(origin.clone());
            self.cookies
                .clone()
                .map_err(|_| SessionError::Cookies("target closed".into()))
        }

        async fn user_agent(&mut self) -> Result<String, SessionError> {
            self.user_agent
                .clone()
                .map_err(|_| SessionError::UserAgent("execution context destroyed".into()))
        }

        async fn close(&mut self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    fn origin() -> Url {
        Url::parse("https://api.example.com/").unwrap()
    }

    #[tokio::test]
    async fn joins_cookies_in_jar_order() {
        let mut session = JarSession {
            cookies: Ok(vec![
                SessionCookie::new("_px3", "zzz"),
                SessionCookie::new("__cf_bm", "aaa"),
                SessionCookie::new("cf_clearance", "mmm"),
            ]),
            user_agent: Ok("Mozilla/5.0 Test".into()),
            asked_for: None,
        };

        let credentials = SessionExtractor::new()
            .extract(&mut session, &origin())
            .await
            .unwrap();

        assert_eq!(
            credentials.cookie_header,
            "_px3=zzz; __cf_bm=aaa; cf_clearance=mmm"
        );
        assert_eq!(credentials.user_agent, "Mozilla/5.0 Test");
        assert_eq!(session.asked_for, Some(origin()));
    }

    #[tokio::test]
    async fn user_agent_failure_yields_empty_string() {
        let mut session = JarSession {
            cookies: Ok(vec![SessionCookie::new("a", "1")]),
            user_agent: Err(()),
            asked_for: None,
        };

        let credentials = SessionExtractor::new()
            .extract(&mut session, &origin())
            .await
            .unwrap();

        assert_eq!(credentials.cookie_header, "a=1");
        assert_eq!(credentials.user_agent, "");
    }

    #[tokio::test]
    async fn cookie_failure_propagates() {
        let mut session = JarSession {
            cookies: Err(()),
            user_agent: Ok("UA".into()),
            asked_for: None,
        };

        let result = SessionExtractor::new().extract(&mut session, &origin()).await;

        assert!(matches!(result, Err(SessionError::Cookies(_))));
    }

    #[test]
    fn empty_jar_gives_empty_header() {
        assert_eq!(cookie_header(&[]), "");
    }
}
