pub(crate) mod matcher;
mod pass;
pub mod rules;

pub use matcher::RewriteStats;
pub use pass::PeepholePass;
pub use rules::RuleCatalogue;
