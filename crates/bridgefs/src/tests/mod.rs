mod adapter;
mod open_policy;
