use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::models::UserAccount;
use crate::error::Result;

/// Storage of published [`UserAccount`] records
///
/// `save` replaces the whole record at once; readers see either the previous
/// record or the new one.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<UserAccount>>;

    async fn save(&self, account: &UserAccount) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<String, UserAccount>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserAccount>> {
        Ok(self.accounts.read().await.get(user_id).cloned())
    }

    async fn save(&self, account: &UserAccount) -> Result<()> {
        self.accounts
            .write()
            .await
            .insert(account.id.clone(), account.clone());
        Ok(())
    }
}
