pub mod critical_utils;
