pub mod utils;

#[cfg(test)]
mod boundaries;
#[cfg(test)]
mod scenarios;
