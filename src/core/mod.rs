// Domain-layer modules and shared errors/models
pub mod enrichment {
    pub use crate::enrichment::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod orchestrator {
    pub use crate::orchestrator::*;
}

pub mod scoring {
    pub use crate::scoring::*;
}

pub mod roi {
    pub use crate::roi::*;
}

pub mod errors {
    pub use crate::errors::*;
}
