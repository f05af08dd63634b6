pub mod highlight;
pub mod league_card;
