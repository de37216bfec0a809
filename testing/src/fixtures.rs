use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Exported system snapshot with an agent list and a multi-line message.
pub const SYSTEM_DOCUMENT: &str = "\
jenkins:
  systemMessage: |
    Managed by automation
    Do not edit by hand
  numExecutors: 2
  nodes:
    - permanent:
        name: agent-1
        remoteFS: /home/agent
    - permanent:
        name: agent-2
        remoteFS: /home/agent
unclassified:
  location:
    url: http://jenkins.local/
";

/// User customizations: an executor count the export overrides, a label on
/// the first agent, and a tool installation the export does not know about.
pub const USER_DOCUMENT: &str = "\
# hand-maintained
jenkins:
  numExecutors: 4
  nodes:
    - permanent:
        name: builder
        labelString: linux
tool:
  git:
    installations:
      - name: default
        home: git
";

/// A scratch host root on the real filesystem.
pub struct TempHome {
    dir: TempDir,
}

impl TempHome {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::Builder::new()
                .prefix(&crate::unique_id("casc-home"))
                .tempdir()?,
        })
    }

    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Write `contents` at `relative`, creating parent directories.
    pub fn write(&self, relative: impl AsRef<Path>, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn read(&self, relative: impl AsRef<Path>) -> Option<String> {
        std::fs::read_to_string(self.path(relative)).ok()
    }
}
