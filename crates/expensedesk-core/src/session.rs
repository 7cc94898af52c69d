//! Authenticated session
//!
//! A session is opened by logging in (or by asking the backend who holds the
//! current cookie) and ends either explicitly or as soon as any call comes
//! back `Unauthorized`.

use crate::client::AccountClient;
use crate::error::{CoreError, CoreResult};
use crate::models::{Credentials, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user: Option<User>,
}

impl Session {
    /// Open a session for the caller the backend recognises
    pub async fn open<A>(account: &A) -> CoreResult<Self>
    where
        A: AccountClient + ?Sized,
    {
        let user = account.current_user().await?;
        log::info!("Session opened for {}", user.username);
        Ok(Self { user: Some(user) })
    }

    /// Log in with `credentials`, then open the session for that user
    pub async fn login<A>(account: &A, credentials: &Credentials) -> CoreResult<Self>
    where
        A: AccountClient + ?Sized,
    {
        account.login(credentials).await?;
        Self::open(account).await
    }

    /// Tell the backend the session is over; closes locally even if that fails
    pub async fn logout<A>(&mut self, account: &A) -> CoreResult<()>
    where
        A: AccountClient + ?Sized,
    {
        let result = account.logout().await;
        self.close();
        result
    }

    pub fn is_open(&self) -> bool {
        self.user.is_some()
    }

    /// The signed-in user, or `SessionClosed`
    pub fn user(&self) -> CoreResult<&User> {
        self.user.as_ref().ok_or(CoreError::SessionClosed)
    }

    pub fn close(&mut self) {
        if let Some(user) = self.user.take() {
            log::info!("Session closed for {}", user.username);
        }
    }

    /// Close the session when `result` says the credentials are no longer accepted
    pub fn observe<T>(&mut self, result: &CoreResult<T>) {
        if matches!(result, Err(CoreError::Unauthorized)) {
            log::warn!("Credentials rejected by the backend");
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AccountRef;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Accepts `alice`/`secret`; `user` is who `/auth/me` reports
    struct FixedAccount {
        user: CoreResult<User>,
        logged_in: Mutex<bool>,
        logout_fails: bool,
    }

    impl FixedAccount {
        fn new(user: CoreResult<User>) -> Self {
            Self {
                user,
                logged_in: Mutex::new(false),
                logout_fails: false,
            }
        }
    }

    #[async_trait]
    impl AccountClient for FixedAccount {
        async fn login(&self, credentials: &Credentials) -> CoreResult<()> {
            if credentials.username == "alice" && credentials.password == "secret" {
                *self.logged_in.lock().unwrap() = true;
                Ok(())
            } else {
                Err(CoreError::Unauthorized)
            }
        }

        async fn logout(&self) -> CoreResult<()> {
            *self.logged_in.lock().unwrap() = false;
            if self.logout_fails {
                return Err(CoreError::Transport {
                    message: "connection reset".to_string(),
                });
            }
            Ok(())
        }

        async fn current_user(&self) -> CoreResult<User> {
            self.user.clone()
        }
    }

    fn alice() -> User {
        User {
            id: 1,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
        }
    }

    fn credentials(password: &str) -> Credentials {
        Credentials {
            username: "alice".to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_open_and_close() {
        let mut session = Session::open(&FixedAccount::new(Ok(alice()))).await.unwrap();
        assert!(session.is_open());
        assert_eq!(session.user().unwrap().username, "alice");

        session.close();
        assert!(!session.is_open());
        assert_eq!(session.user(), Err(CoreError::SessionClosed));
    }

    #[tokio::test]
    async fn test_open_unauthorized() {
        let result = Session::open(&FixedAccount::new(Err(CoreError::Unauthorized))).await;
        assert_eq!(result, Err(CoreError::Unauthorized));
    }

    #[tokio::test]
    async fn test_login_and_logout_through_shared_account() {
        let fixed = Arc::new(FixedAccount::new(Ok(alice())));
        let account: AccountRef = fixed.clone();

        assert_eq!(
            Session::login(account.as_ref(), &credentials("guess")).await,
            Err(CoreError::Unauthorized)
        );

        let mut session = Session::login(account.as_ref(), &credentials("secret")).await.unwrap();
        assert!(*fixed.logged_in.lock().unwrap());
        assert_eq!(session.user().unwrap().email, "alice@example.com");

        session.logout(account.as_ref()).await.unwrap();
        assert!(!session.is_open());
        assert!(!*fixed.logged_in.lock().unwrap());
    }

    #[tokio::test]
    async fn test_failed_logout_still_closes() {
        let account = FixedAccount {
            logout_fails: true,
            ..FixedAccount::new(Ok(alice()))
        };
        let mut session = Session::open(&account).await.unwrap();
        assert!(matches!(
            session.logout(&account).await,
            Err(CoreError::Transport { .. })
        ));
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn test_unauthorized_result_closes() {
        let mut session = Session::open(&FixedAccount::new(Ok(alice()))).await.unwrap();
        session.observe::<()>(&Err(CoreError::Timeout { seconds: 30 }));
        assert!(session.is_open());
        session.observe::<()>(&Err(CoreError::Unauthorized));
        assert!(!session.is_open());
    }
}
