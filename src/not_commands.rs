pub mod photo;
pub mod prompt;
pub mod variant_choice;
