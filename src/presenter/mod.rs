pub mod download;
pub mod results;

pub use results::{FormationCard, ImagePanel, PanelImage, ResultsPresenter, ResultsView};
