//! Board identity sourced from the kernel command line.

use crate::cmdline::KernelCmdline;
use diaglock_core::config::DiagLockConfig;
use diaglock_core::error::{DiagLockError, DiagLockResult};
use diaglock_provider::{BoardInfo, Operator};
use log::{debug, warn};
use std::fs;
use std::path::Path;

/// Factory and carrier identity resolved once at construction.
///
/// Values pinned in `[board]` take precedence over the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdlineBoardInfo {
    factory_boot: bool,
    operator: Operator,
}

impl CmdlineBoardInfo {
    /// Build from configuration, reading `board.cmdline_path` when needed.
    pub fn from_config(config: &DiagLockConfig) -> DiagLockResult<Self> {
        let board = &config.board;
        let needs_cmdline = board.factory_boot.is_none() || config.pinned_operator().is_none();

        let cmdline = match (needs_cmdline, config.cmdline_path()) {
            (true, Some(path)) => read_cmdline(&path)?,
            (true, None) => {
                warn!("board.cmdline_path is empty; unresolved board identity falls back to defaults");
                KernelCmdline::default()
            }
            (false, _) => KernelCmdline::default(),
        };

        Ok(Self::resolve(config, &cmdline))
    }

    /// Combine pinned configuration with an already parsed command line.
    pub fn resolve(config: &DiagLockConfig, cmdline: &KernelCmdline) -> Self {
        let board = &config.board;
        let factory_boot = board
            .factory_boot
            .unwrap_or_else(|| cmdline.flag(&board.factory_key));
        let operator = config.pinned_operator().unwrap_or_else(|| {
            Operator::from_code(cmdline.get(&board.operator_key).unwrap_or_default())
        });
        debug!("board identity: factory_boot={factory_boot}, operator={operator}");

        Self {
            factory_boot,
            operator,
        }
    }
}

impl BoardInfo for CmdlineBoardInfo {
    fn factory_boot(&self) -> bool {
        self.factory_boot
    }

    fn operator(&self) -> Operator {
        self.operator.clone()
    }
}

fn read_cmdline(path: &Path) -> DiagLockResult<KernelCmdline> {
    let raw = fs::read_to_string(path).map_err(|err| {
        DiagLockError::Provider(format!(
            "failed to read kernel command line at {}: {err}",
            path.display()
        ))
    })?;
    Ok(KernelCmdline::parse(&raw))
}
