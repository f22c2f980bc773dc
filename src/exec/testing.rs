// file: src/exec/testing.rs
// description: scripted command runner used by unit tests instead of real binaries

use super::{CommandRunner, Invocation, ToolOutput};
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

type Script = Box<dyn Fn(&Invocation) -> Result<ToolOutput> + Send + Sync>;

pub struct ScriptedRunner {
    script: Script,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&Invocation) -> Result<ToolOutput> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(|_| Ok(ToolOutput::success("")))
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        self.calls.lock().push(invocation.clone());
        (self.script)(invocation)
    }
}
