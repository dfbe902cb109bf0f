//! Full-repair orchestration: validate, download, post-process
//!
//! Runs inside the worker process. Processors are validated in declaration
//! order, their findings are unioned into one download plan, the engine
//! repairs everything, and each processor then gets its post-download hook.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::asset::Asset;
use crate::config::CoreConfig;
use crate::distribution::DistributionApi;
use crate::download::{expected_total, DownloadEngine};
use crate::error::{DisplayableError, LauncherError, Result};
use crate::processor::{DistributionProcessor, IndexProcessor};
use crate::worker::{MessageSink, Receiver};

/// Registry id of the full-repair receiver
pub const FULL_REPAIR_RECEIVER_ID: &str = "full-repair";

/// Stage label byte progress is reported under
const DOWNLOAD_STAGE: &str = "download";

/// Arguments of a full-repair command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullRepairArgs {
    /// Directory shared between server instances
    pub common_dir: PathBuf,
    /// Directory holding per-server instance files
    pub instance_dir: PathBuf,
    /// Launcher state directory
    pub launcher_directory: PathBuf,
    /// Remote distribution index URL
    pub distribution_url: String,
    /// Use only the local dev distribution
    pub dev_mode: bool,
    /// Which server to repair
    pub server_id: String,
}

impl FullRepairArgs {
    fn to_config(&self) -> CoreConfig {
        CoreConfig::new(self.launcher_directory.clone())
            .with_common_dir(self.common_dir.clone())
            .with_instance_dir(self.instance_dir.clone())
            .with_distribution_url(self.distribution_url.clone())
            .with_dev_mode(self.dev_mode)
    }
}

/// The worker receiver driving a full validate/download/post-process cycle
pub struct FullRepairReceiver;

impl FullRepairReceiver {
    async fn run(&self, args: FullRepairArgs, sink: &MessageSink) -> Result<Value> {
        let config = args.to_config();

        let mut api = DistributionApi::new(config.clone())?;
        let distribution = api.get_distribution().await?.clone();

        // Ordered processor list; Mojang version/asset processors follow the
        // same contract and slot in here.
        let mut processors: Vec<Box<dyn IndexProcessor>> = vec![Box::new(
            DistributionProcessor::new(distribution, config.common_dir.clone()),
        )];
        let total_stages = processors.len();

        let mut categories: HashMap<String, Vec<Asset>> = HashMap::new();
        for (index, processor) in processors.iter_mut().enumerate() {
            processor.init().await?;
            for (category, mut assets) in processor.validate(&args.server_id).await? {
                categories.entry(category).or_default().append(&mut assets);
            }
            sink.stage_complete(index + 1, total_stages);
        }

        let assets: Vec<Asset> = categories.into_values().flatten().collect();
        let repaired = assets.len();
        let total_bytes = expected_total(&assets);
        // Announce the plan before any byte moves
        sink.progress(DOWNLOAD_STAGE, 0, total_bytes);

        let engine = DownloadEngine::new()?;
        let progress_sink = sink.clone();
        engine
            .run(assets, move |received| {
                progress_sink.progress(DOWNLOAD_STAGE, received, total_bytes);
            })
            .await?;

        for processor in processors.iter_mut() {
            processor.post_download(&args.server_id).await?;
        }

        Ok(serde_json::json!({ "repaired": repaired }))
    }
}

#[async_trait]
impl Receiver for FullRepairReceiver {
    fn id(&self) -> &'static str {
        FULL_REPAIR_RECEIVER_ID
    }

    async fn execute(&self, args: Value, sink: &MessageSink) -> Result<Value> {
        let args: FullRepairArgs = serde_json::from_value(args)?;
        self.run(args, sink).await
    }

    fn display_error(&self, error: &LauncherError) -> Option<DisplayableError> {
        match error {
            LauncherError::DistributionLoadFailed(_) => Some(DisplayableError::new(
                "Unable to Load Distribution",
                "The server index could not be fetched and no usable local copy exists. Check your connection and try again.",
            )),
            LauncherError::Http(_)
            | LauncherError::Timeout(_)
            | LauncherError::Unreachable(_)
            | LauncherError::ConnectionRefused(_)
            | LauncherError::Reset(_) => Some(DisplayableError::new(
                "Download Error",
                "Files could not be downloaded. Check your connection and try again.",
            )),
            LauncherError::HashMismatch { .. } | LauncherError::SizeMismatch { .. } => {
                Some(DisplayableError::new(
                    "File Validation Failed",
                    "A downloaded file did not match the server index. Running a repair again usually fixes this.",
                ))
            }
            LauncherError::UnknownServerId(id) => Some(DisplayableError::new(
                "Unknown Server",
                format!("The server \"{id}\" is not part of the current distribution."),
            )),
            LauncherError::NoModLoader(id) => Some(DisplayableError::new(
                "Invalid Server Configuration",
                format!("The server \"{id}\" declares no mod loader."),
            )),
            _ => None,
        }
    }
}
