//! Slack workspace directory as a [`ProfileSource`].

use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use checkerboard_core::{ProfileRecord, ProfileSource, ProfileStream, SourceError};
use futures::{Stream, StreamExt};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::client::SlackClient;
use crate::config::SlackConfig;
use crate::error::{SlackError, SlackResult};

/// Enumerates workspace members and reads their GitHub profile field.
///
/// The field label is resolved to its ID on first use and cached for the
/// life of the directory.
#[derive(Debug)]
pub struct SlackDirectory {
    client: SlackClient,
    field_id: OnceCell<Arc<str>>,
}

impl SlackDirectory {
    pub fn new(config: SlackConfig) -> SlackResult<Self> {
        Ok(Self::with_client(SlackClient::new(config)?))
    }

    pub fn with_client(client: SlackClient) -> Self {
        Self {
            client,
            field_id: OnceCell::new(),
        }
    }

    pub fn client(&self) -> &SlackClient {
        &self.client
    }

    /// ID of the configured profile field.
    pub async fn field_id(&self) -> SlackResult<Arc<str>> {
        self.field_id
            .get_or_try_init(|| async {
                let label = self.client.config().profile_field();
                let fields = self.client.team_profile_fields().await?;
                let field = fields
                    .into_iter()
                    .find(|field| field.label == label)
                    .ok_or_else(|| SlackError::UnknownField(label.to_string()))?;
                info!(label, field_id = %field.id, "Resolved Slack profile field");
                Ok::<_, SlackError>(Arc::from(field.id))
            })
            .await
            .cloned()
    }

    /// IDs of every person in the workspace, following pagination.
    fn person_ids(&self) -> impl Stream<Item = SlackResult<String>> + Send + '_ {
        try_stream! {
            let mut cursor: Option<String> = None;
            let mut pages = 0u32;
            let mut listed = 0usize;

            loop {
                let page = self.client.list_users(cursor.as_deref()).await?;
                pages += 1;
                for member in &page.members {
                    if let Some(id) = member.person_id() {
                        listed += 1;
                        yield id.to_string();
                    }
                }
                match page.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }

            debug!(pages, listed, "Finished listing Slack users");
        }
    }

    async fn fetch_record(&self, slack_id: String, field_id: &str) -> SlackResult<ProfileRecord> {
        let github_field = self.client.profile_field_value(&slack_id, field_id).await?;
        if let Some(value) = &github_field {
            debug!(slack_id = %slack_id, github = %value, "Found GitHub profile field");
        }
        Ok(ProfileRecord {
            slack_id,
            github_field,
        })
    }
}

#[async_trait]
impl ProfileSource for SlackDirectory {
    async fn enumerate_users(&self) -> Result<ProfileStream<'_>, SourceError> {
        let field_id = self.field_id().await?;
        let concurrency = self.client.config().concurrency().max(1);

        let records = self
            .person_ids()
            .map(move |id| {
                let field_id = Arc::clone(&field_id);
                async move { self.fetch_record(id?, &field_id).await }
            })
            .buffered(concurrency)
            .map(|record| record.map_err(SourceError::from));

        Ok(records.boxed())
    }

    fn profile_field(&self) -> &str {
        self.client.config().profile_field()
    }
}
