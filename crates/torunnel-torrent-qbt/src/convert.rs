//! Mapping from `/api/v2/torrents/info` entries to transfer status snapshots.

use serde::Deserialize;
use torunnel_torrent_core::{LifecycleState, TransferError, TransferResult, TransferStatus};
use tracing::debug;

/// Subset of the torrent info object the adapter reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TorrentInfo {
    #[serde(default)]
    pub(crate) hash: String,
    #[serde(default)]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) progress: f64,
    #[serde(default)]
    pub(crate) dlspeed: i64,
    #[serde(default)]
    pub(crate) upspeed: i64,
    #[serde(default)]
    pub(crate) num_seeds: i64,
    #[serde(default)]
    pub(crate) num_leechs: i64,
    #[serde(default)]
    pub(crate) state: String,
    #[serde(default)]
    pub(crate) total_size: i64,
    #[serde(default)]
    pub(crate) has_metadata: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineState {
    Active(LifecycleState),
    Failed,
    Unknown,
}

pub(crate) fn map_state(state: &str) -> EngineState {
    let lifecycle = match state {
        "metaDL" | "forcedMetaDL" => LifecycleState::RetrievingMetadata,
        "allocating" => LifecycleState::Allocating,
        "checkingDL" | "checkingUP" | "checkingResumeData" => LifecycleState::Checking,
        "downloading" | "stalledDL" | "forcedDL" | "pausedDL" | "stoppedDL" | "queuedDL" => {
            LifecycleState::Downloading
        }
        "moving" => LifecycleState::Finished,
        "uploading" | "stalledUP" | "forcedUP" | "pausedUP" | "stoppedUP" | "queuedUP" => {
            LifecycleState::Seeding
        }
        "error" | "missingFiles" => return EngineState::Failed,
        _ => return EngineState::Unknown,
    };
    EngineState::Active(lifecycle)
}

impl TorrentInfo {
    fn metadata_known(&self) -> bool {
        if matches!(
            map_state(&self.state),
            EngineState::Active(LifecycleState::RetrievingMetadata)
        ) {
            return false;
        }
        self.has_metadata.unwrap_or(self.total_size > 0)
    }

    pub(crate) fn into_status(self) -> TransferResult<TransferStatus> {
        let known = self.metadata_known();
        let state = match map_state(&self.state) {
            EngineState::Active(state) => state,
            EngineState::Failed => {
                return Err(TransferError::Failed {
                    message: format!("engine reported state {}", self.state),
                });
            }
            EngineState::Unknown => {
                debug!(state = %self.state, "unknown engine state reported");
                if known {
                    LifecycleState::Downloading
                } else {
                    LifecycleState::QueuedForMetadata
                }
            }
        };

        let peers = self.num_seeds.max(0).saturating_add(self.num_leechs.max(0));
        Ok(TransferStatus {
            progress_fraction: self.progress,
            download_bps: u64::try_from(self.dlspeed).unwrap_or_default(),
            upload_bps: u64::try_from(self.upspeed).unwrap_or_default(),
            peers: u32::try_from(peers).unwrap_or(u32::MAX),
            state,
            resolved_name: (known && !self.name.is_empty()).then_some(self.name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(state: &str, has_metadata: Option<bool>) -> TorrentInfo {
        TorrentInfo {
            hash: "abc".into(),
            name: "AlbumX".into(),
            progress: 0.5,
            dlspeed: 2048,
            upspeed: 512,
            num_seeds: 3,
            num_leechs: 4,
            state: state.into(),
            total_size: 1_000,
            has_metadata,
        }
    }

    #[test]
    fn engine_states_map_onto_lifecycle() {
        let cases = [
            ("metaDL", LifecycleState::RetrievingMetadata),
            ("allocating", LifecycleState::Allocating),
            ("checkingResumeData", LifecycleState::Checking),
            ("stalledDL", LifecycleState::Downloading),
            ("queuedDL", LifecycleState::Downloading),
            ("moving", LifecycleState::Finished),
            ("stalledUP", LifecycleState::Seeding),
            ("stoppedUP", LifecycleState::Seeding),
        ];
        for (raw, expected) in cases {
            assert_eq!(map_state(raw), EngineState::Active(expected), "state {raw}");
        }
        assert_eq!(map_state("missingFiles"), EngineState::Failed);
        assert_eq!(map_state("somethingNew"), EngineState::Unknown);
    }

    #[test]
    fn status_carries_rates_and_peer_count() -> TransferResult<()> {
        let status = info("downloading", Some(true)).into_status()?;
        assert_eq!(status.state, LifecycleState::Downloading);
        assert_eq!(status.download_bps, 2048);
        assert_eq!(status.upload_bps, 512);
        assert_eq!(status.peers, 7);
        assert_eq!(status.resolved_name.as_deref(), Some("AlbumX"));
        Ok(())
    }

    #[test]
    fn name_is_withheld_until_metadata_is_known() -> TransferResult<()> {
        let fetching = info("metaDL", None).into_status()?;
        assert_eq!(fetching.resolved_name, None);

        let mut unsized_info = info("downloading", None);
        unsized_info.total_size = -1;
        assert_eq!(unsized_info.into_status()?.resolved_name, None);

        let flagged = info("stalledDL", Some(false)).into_status()?;
        assert_eq!(flagged.resolved_name, None);
        Ok(())
    }

    #[test]
    fn error_states_become_transfer_failures() {
        match info("error", Some(true)).into_status() {
            Err(TransferError::Failed { message }) => assert!(message.contains("error")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn negative_rates_clamp_to_zero() -> TransferResult<()> {
        let mut raw = info("uploading", Some(true));
        raw.dlspeed = -1;
        raw.num_seeds = -1;
        let status = raw.into_status()?;
        assert_eq!(status.download_bps, 0);
        assert_eq!(status.peers, 4);
        Ok(())
    }
}
