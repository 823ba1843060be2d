pub mod attendance_api;
