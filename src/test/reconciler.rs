use std::collections::{BTreeMap, BTreeSet};

use crate::error::AppError;
use crate::reconciler::{
    AttendanceMark, RawStudentAttendance, days_in_month, holiday_days, is_sunday,
    reconcile_month,
};

fn raw(student_id: i64, marks: &[(u32, AttendanceMark)]) -> RawStudentAttendance {
    RawStudentAttendance {
        student_id,
        roll_no: student_id,
        name: format!("Student {}", student_id),
        marks: marks.iter().copied().collect::<BTreeMap<_, _>>(),
    }
}

#[test]
fn test_days_in_month() {
    assert_eq!(days_in_month(2025, 3).unwrap(), 31);
    assert_eq!(days_in_month(2025, 4).unwrap(), 30);
    assert_eq!(days_in_month(2025, 2).unwrap(), 28);
    assert_eq!(days_in_month(2024, 2).unwrap(), 29);
    assert_eq!(days_in_month(2024, 12).unwrap(), 31);

    assert!(matches!(days_in_month(2025, 13), Err(AppError::Validation(_))));
    assert!(matches!(days_in_month(2025, 0), Err(AppError::Validation(_))));
}

#[test]
fn test_is_sunday() {
    assert!(is_sunday(2025, 3, 2));
    assert!(is_sunday(2025, 3, 30));
    assert!(!is_sunday(2025, 3, 1));
    assert!(!is_sunday(2025, 3, 32));
}

#[test]
fn test_march_2025_percentage() {
    let instructional: Vec<u32> = (1..=31).filter(|day| !is_sunday(2025, 3, *day)).collect();
    assert_eq!(instructional.len(), 26);

    let marks: Vec<(u32, AttendanceMark)> = instructional
        .iter()
        .enumerate()
        .map(|(index, day)| {
            let mark = if index < 20 {
                AttendanceMark::Present
            } else {
                AttendanceMark::Absent
            };
            (*day, mark)
        })
        .collect();

    let report = reconcile_month(2025, 3, vec![raw(1, &marks)], &BTreeSet::new()).unwrap();
    let summary = &report.students[0];

    assert_eq!(report.days_in_month, 31);
    assert_eq!(report.holidays, vec![2, 9, 16, 23, 30]);
    assert_eq!(summary.present, 20);
    assert_eq!(summary.instructional_days, 26);
    assert_eq!(summary.percentage, 77);
    assert_eq!(summary.days[&2], AttendanceMark::Holiday);
    assert_eq!(summary.days.len(), 31);
}

#[test]
fn test_sunday_marks_are_not_overwritten() {
    // A class held on a Sunday keeps its recorded mark.
    let report = reconcile_month(
        2025,
        3,
        vec![raw(1, &[(2, AttendanceMark::Present), (3, AttendanceMark::Absent)])],
        &BTreeSet::new(),
    )
    .unwrap();
    let summary = &report.students[0];

    assert_eq!(summary.days[&2], AttendanceMark::Present);
    assert_eq!(summary.days[&9], AttendanceMark::Holiday);
    assert_eq!(summary.days[&4], AttendanceMark::Unmarked);
    assert_eq!(summary.present, 1);
    assert_eq!(summary.instructional_days, 2);
    assert_eq!(summary.percentage, 50);
}

#[test]
fn test_single_holiday_mark_applies_to_class() {
    let students = vec![
        raw(1, &[(4, AttendanceMark::Holiday)]),
        raw(2, &[(4, AttendanceMark::Present)]),
        raw(3, &[]),
    ];

    let holidays = holiday_days(2025, 3, &students, &BTreeSet::new()).unwrap();
    assert!(holidays.contains(&4));

    let report = reconcile_month(2025, 3, students, &BTreeSet::new()).unwrap();

    assert_eq!(report.students[0].days[&4], AttendanceMark::Holiday);
    assert_eq!(report.students[1].days[&4], AttendanceMark::Present);
    assert_eq!(report.students[2].days[&4], AttendanceMark::Holiday);
}

#[test]
fn test_declared_holidays_fill_gaps() {
    let declared: BTreeSet<u32> = [14].into_iter().collect();

    let report = reconcile_month(2025, 3, vec![raw(1, &[(13, AttendanceMark::Present)])], &declared)
        .unwrap();

    assert!(report.holidays.contains(&14));
    assert_eq!(report.students[0].days[&14], AttendanceMark::Holiday);
    assert_eq!(report.students[0].percentage, 100);
}

#[test]
fn test_no_instructional_days_is_zero_percent() {
    let report = reconcile_month(2025, 3, vec![raw(1, &[])], &BTreeSet::new()).unwrap();

    assert_eq!(report.students[0].instructional_days, 0);
    assert_eq!(report.students[0].percentage, 0);
    assert_eq!(report.average_percentage, 0);
}

#[test]
fn test_average_percentage() {
    let students = vec![
        raw(1, &[(3, AttendanceMark::Present), (4, AttendanceMark::Present)]),
        raw(2, &[(3, AttendanceMark::Present), (4, AttendanceMark::Absent)]),
        raw(3, &[(3, AttendanceMark::Absent)]),
    ];

    let report = reconcile_month(2025, 3, students, &BTreeSet::new()).unwrap();

    let percentages: Vec<u32> = report.students.iter().map(|s| s.percentage).collect();
    assert_eq!(percentages, vec![100, 50, 0]);
    assert_eq!(report.average_percentage, 50);

    let empty = reconcile_month(2025, 3, Vec::new(), &BTreeSet::new()).unwrap();
    assert_eq!(empty.average_percentage, 0);
    assert!(empty.students.is_empty());
}
