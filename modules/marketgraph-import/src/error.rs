use marketgraph_common::ConfigError;

/// Fatal run errors. Anything else is absorbed inside the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Could not connect to MongoDB after {attempts} attempts: {message}")]
    SourceConnect { attempts: u32, message: String },

    #[error("Could not connect to Neo4j after {attempts} attempts: {message}")]
    TargetConnect { attempts: u32, message: String },
}
