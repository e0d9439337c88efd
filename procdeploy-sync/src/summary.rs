use procdeploy_core::ScriptName;

/// What happened to one script during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
    /// Every statement committed and the metadata row was written.
    Deployed { statements: usize },
    /// Fingerprint matched the stored one; nothing executed.
    Skipped,
    /// Deployment stopped at `statement` (1-based), or before any statement
    /// when the file itself could not be read.
    Errored {
        statement: Option<usize>,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptReport {
    pub name: ScriptName,
    pub outcome: ScriptOutcome,
}

/// Totals for a run, plus the per-script outcomes in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub deployed: usize,
    pub skipped: usize,
    pub errored: usize,
    pub scripts: Vec<ScriptReport>,
}

impl RunSummary {
    pub fn record(&mut self, name: ScriptName, outcome: ScriptOutcome) {
        match outcome {
            ScriptOutcome::Deployed { .. } => self.deployed += 1,
            ScriptOutcome::Skipped => self.skipped += 1,
            ScriptOutcome::Errored { .. } => self.errored += 1,
        }
        self.scripts.push(ScriptReport { name, outcome });
    }

    pub fn total(&self) -> usize {
        self.scripts.len()
    }

    /// True when no script errored.
    pub fn is_success(&self) -> bool {
        self.errored == 0
    }

    pub fn errored_scripts(&self) -> impl Iterator<Item = &ScriptReport> {
        self.scripts
            .iter()
            .filter(|r| matches!(r.outcome, ScriptOutcome::Errored { .. }))
    }
}
