use super::db::{Database, DatabaseError};
use super::models::ShareLinkRecord;
use super::tables::*;

impl Database {
    // ========================================================================
    // Share link operations
    // ========================================================================

    /// Persist a share link. Links are immutable; there is no update and
    /// no revoke, expiry is the only termination.
    pub fn create_share_link(&self, link: &ShareLinkRecord) -> Result<(), DatabaseError> {
        debug_assert!(!link.token.is_empty(), "share token must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(SHARE_LINKS)?;
            let data = rmp_serde::to_vec_named(link)?;
            table.insert(link.token.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a share link by token. Expiry is the caller's concern:
    /// expired links must be treated exactly like absent ones.
    pub fn get_share_link(&self, token: &str) -> Result<Option<ShareLinkRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SHARE_LINKS)?;

        match table.get(token)? {
            Some(data) => {
                let link: ShareLinkRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(link))
            }
            None => Ok(None),
        }
    }
}
