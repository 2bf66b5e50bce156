pub mod seed_match;
