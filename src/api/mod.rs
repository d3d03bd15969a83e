pub mod checkin;
