pub mod achievements;
pub mod calls;
pub mod chat;
pub mod leaderboard;
pub mod lifecycle;
pub mod peers;
pub mod profiles;
pub mod resources;
pub mod reviews;
pub mod skills;

#[cfg(test)]
pub(crate) mod test_support;
