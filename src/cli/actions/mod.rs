pub mod run;
pub mod server;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
}

impl Action {
    // Convenience wrapper so call sites can do `action.execute().await`.
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
