use crate::db::{
    create_student, delete_student, get_roll_numbers, get_student, get_students_in_class,
    update_student,
};
use crate::error::AppError;
use crate::models::{NewStudent, StudentStatus, StudentUpdate};
use crate::test::utils::{ADMISSION_YEAR, TestDbBuilder};

fn new_student(gr_no: &str, standard: &str, class_name: &str, roll_no: Option<i64>) -> NewStudent {
    NewStudent {
        gr_no: gr_no.to_string(),
        name: format!("Student {}", gr_no),
        standard: standard.to_string(),
        class_name: class_name.to_string(),
        roll_no,
    }
}

#[rocket::async_test]
async fn test_roll_numbers_allocated_per_class() {
    let test_db = TestDbBuilder::new()
        .build()
        .await
        .expect("Failed to build test database");
    let pool = &test_db.pool;

    let first = create_student(pool, &new_student("GR-1", "3", "Dhruv", None), 2025)
        .await
        .expect("Failed to create first student");
    assert_eq!(first.roll_no, 1);
    assert_eq!(first.enrollment_no, "25030001");
    assert_eq!(first.status, StudentStatus::Active);

    let manual = create_student(pool, &new_student("GR-2", "3", "Dhruv", Some(7)), 2025)
        .await
        .expect("Failed to create student with roll number");
    assert_eq!(manual.roll_no, 7);
    assert_eq!(manual.enrollment_no, "25030007");

    let next = create_student(pool, &new_student("GR-3", "3", "Dhruv", None), 2025)
        .await
        .expect("Failed to create third student");
    assert_eq!(next.roll_no, 8);

    // Another standard's class starts from one again.
    let other_standard = create_student(pool, &new_student("GR-4", "4", "Dhruv", None), 2025)
        .await
        .expect("Failed to create student in other standard");
    assert_eq!(other_standard.roll_no, 1);
    assert_eq!(other_standard.enrollment_no, "25040001");

    let kg = create_student(pool, &new_student("GR-5", "KG1", "Eklavya", None), 2025)
        .await
        .expect("Failed to create KG student");
    assert_eq!(kg.enrollment_no, "25000001");

    let rolls = get_roll_numbers(pool, "3", "Dhruv", None)
        .await
        .expect("Failed to read roll numbers");
    assert_eq!(rolls, vec![8, 7, 1]);
}

#[rocket::async_test]
async fn test_sibling_class_enrollment_collision_is_named() {
    let test_db = TestDbBuilder::new()
        .student("GR-1", "Asha", "3", "Dhruv", None)
        .build()
        .await
        .expect("Failed to build test database");
    let pool = &test_db.pool;

    // 3/Prahlad is empty so it allocates roll 1, which derives the same
    // enrollment number as 3/Dhruv roll 1.
    match create_student(pool, &new_student("GR-2", "3", "Prahlad", None), 2025).await {
        Err(AppError::Validation(msg)) => {
            assert_eq!(msg, "Enrollment number 25030001 already exists")
        }
        other => panic!("Expected enrollment collision, got {:?}", other.map(|s| s.id)),
    }
    assert!(
        get_students_in_class(pool, "3", "Prahlad", true)
            .await
            .expect("Failed to list class")
            .is_empty()
    );

    let numbered = create_student(pool, &new_student("GR-2", "3", "Prahlad", Some(21)), 2025)
        .await
        .expect("Failed to create student with free roll number");
    assert_eq!(numbered.enrollment_no, "25030021");

    let next = create_student(pool, &new_student("GR-3", "3", "Prahlad", None), 2025)
        .await
        .expect("Failed to allocate after explicit roll");
    assert_eq!(next.roll_no, 22);
    assert_eq!(next.enrollment_no, "25030022");

    // A roll move onto a number a sibling class holds is refused the same way.
    match update_student(
        pool,
        next.id,
        &StudentUpdate {
            roll_no: Some(1),
            ..Default::default()
        },
        2025,
    )
    .await
    {
        Err(AppError::Validation(msg)) => assert!(msg.contains("25030001")),
        other => panic!("Expected enrollment collision, got {:?}", other.map(|s| s.id)),
    }
}

#[rocket::async_test]
async fn test_constraint_rejection_is_generic_failure() {
    let test_db = TestDbBuilder::new()
        .student("GR-1", "Asha", "3", "Dhruv", Some(5))
        .build()
        .await
        .expect("Failed to build test database");
    let pool = &test_db.pool;
    let asha = test_db.student_id("GR-1").expect("Student not found");

    // Each trigger writes a competing row between the allocator's reads and
    // the write, the way a concurrent admission would.
    sqlx::query(
        "CREATE TRIGGER competing_admission BEFORE INSERT ON students
         WHEN NEW.gr_no = 'GR-2'
         BEGIN
             INSERT INTO students (gr_no, enrollment_no, roll_no, name, standard, class_name)
             VALUES ('GR-90', NEW.enrollment_no, NEW.roll_no, 'Competing', NEW.standard, NEW.class_name);
         END",
    )
    .execute(pool)
    .await
    .expect("Failed to create insert trigger");
    sqlx::query(
        "CREATE TRIGGER competing_transfer BEFORE UPDATE ON students
         WHEN NEW.roll_no = 9
         BEGIN
             INSERT INTO students (gr_no, enrollment_no, roll_no, name, standard, class_name)
             VALUES ('GR-91', NEW.enrollment_no, NEW.roll_no, 'Competing', NEW.standard, NEW.class_name);
         END",
    )
    .execute(pool)
    .await
    .expect("Failed to create update trigger");

    match create_student(pool, &new_student("GR-2", "3", "Dhruv", None), 2025).await {
        Err(AppError::Internal(msg)) => assert_eq!(msg, "Failed to create student"),
        other => panic!("Expected generic failure, got {:?}", other.map(|s| s.id)),
    }

    match update_student(
        pool,
        asha,
        &StudentUpdate {
            roll_no: Some(9),
            ..Default::default()
        },
        2025,
    )
    .await
    {
        Err(AppError::Internal(msg)) => assert_eq!(msg, "Failed to update student"),
        other => panic!("Expected generic failure, got {:?}", other.map(|s| s.id)),
    }

    let students = get_students_in_class(pool, "3", "Dhruv", true)
        .await
        .expect("Failed to list class");
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].gr_no, "GR-1");
    assert_eq!(students[0].roll_no, 5);
    assert_eq!(students[0].enrollment_no, "25030005");
}

#[rocket::async_test]
async fn test_duplicate_roll_number_creates_nothing() {
    let test_db = TestDbBuilder::new()
        .student("GR-1", "Asha", "3", "Dhruv", Some(4))
        .build()
        .await
        .expect("Failed to build test database");
    let pool = &test_db.pool;

    let result = create_student(pool, &new_student("GR-2", "3", "Dhruv", Some(4)), 2025).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let students = get_students_in_class(pool, "3", "Dhruv", true)
        .await
        .expect("Failed to list class");
    assert_eq!(students.len(), 1);
}

#[rocket::async_test]
async fn test_invalid_class_and_duplicate_gr_rejected() {
    let test_db = TestDbBuilder::new()
        .student("GR-1", "Asha", "3", "Dhruv", None)
        .build()
        .await
        .expect("Failed to build test database");
    let pool = &test_db.pool;

    // Eklavya only exists up to standard 5.
    let wrong_class = create_student(pool, &new_student("GR-2", "8", "Eklavya", None), 2025).await;
    assert!(matches!(wrong_class, Err(AppError::Validation(_))));

    let wrong_standard = create_student(pool, &new_student("GR-3", "13", "Dhruv", None), 2025).await;
    assert!(matches!(wrong_standard, Err(AppError::Validation(_))));

    match create_student(pool, &new_student("GR-1", "4", "Dhruv", None), 2025).await {
        Err(AppError::Validation(msg)) => assert!(msg.contains("GR-1")),
        other => panic!("Expected GR number rejection, got {:?}", other.map(|s| s.id)),
    }
}

#[rocket::async_test]
async fn test_roll_edit_regenerates_enrollment() {
    let test_db = TestDbBuilder::new()
        .student("GR-1", "Asha", "3", "Dhruv", Some(7))
        .build()
        .await
        .expect("Failed to build test database");
    let pool = &test_db.pool;
    let id = test_db.student_id("GR-1").expect("Student not found");

    let student = get_student(pool, id).await.expect("Failed to read student");
    assert_eq!(student.enrollment_no, "25030007");

    let renamed = update_student(
        pool,
        id,
        &StudentUpdate {
            name: Some("Asha Patel".to_string()),
            ..Default::default()
        },
        2026,
    )
    .await
    .expect("Failed to rename student");
    assert_eq!(renamed.name, "Asha Patel");
    assert_eq!(renamed.enrollment_no, "25030007");

    let class_move = update_student(
        pool,
        id,
        &StudentUpdate {
            class_name: Some("Prahlad".to_string()),
            ..Default::default()
        },
        2026,
    )
    .await
    .expect("Failed to move student");
    assert_eq!(class_move.class_name, "Prahlad");
    assert_eq!(class_move.enrollment_no, "25030007");

    let re_rolled = update_student(
        pool,
        id,
        &StudentUpdate {
            roll_no: Some(9),
            ..Default::default()
        },
        2026,
    )
    .await
    .expect("Failed to change roll number");
    assert_eq!(re_rolled.roll_no, 9);
    assert_eq!(re_rolled.enrollment_no, "26030009");

    let promoted = update_student(
        pool,
        id,
        &StudentUpdate {
            standard: Some("4".to_string()),
            class_name: Some("Dhruv".to_string()),
            ..Default::default()
        },
        2026,
    )
    .await
    .expect("Failed to promote student");
    assert_eq!(promoted.enrollment_no, "26040009");
}

#[rocket::async_test]
async fn test_update_rejects_taken_roll_and_keeps_record() {
    let test_db = TestDbBuilder::new()
        .student("GR-1", "Asha", "3", "Dhruv", None)
        .student("GR-2", "Bharat", "3", "Dhruv", None)
        .build()
        .await
        .expect("Failed to build test database");
    let pool = &test_db.pool;
    let id = test_db.student_id("GR-2").expect("Student not found");

    let result = update_student(
        pool,
        id,
        &StudentUpdate {
            roll_no: Some(1),
            ..Default::default()
        },
        ADMISSION_YEAR,
    )
    .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let unchanged = get_student(pool, id).await.expect("Failed to read student");
    assert_eq!(unchanged.roll_no, 2);
    assert_eq!(unchanged.enrollment_no, "25030002");
}

#[rocket::async_test]
async fn test_regenerated_enrollment_must_be_unique() {
    // Same roll number in two classes of one standard shares an enrollment
    // number once both are regenerated in the same year.
    let test_db = TestDbBuilder::new()
        .student("GR-1", "Asha", "3", "Dhruv", Some(5))
        .student("GR-2", "Bharat", "3", "Prahlad", Some(6))
        .build()
        .await
        .expect("Failed to build test database");
    let pool = &test_db.pool;
    let id = test_db.student_id("GR-2").expect("Student not found");

    let result = update_student(
        pool,
        id,
        &StudentUpdate {
            roll_no: Some(5),
            ..Default::default()
        },
        ADMISSION_YEAR,
    )
    .await;

    match result {
        Err(AppError::Validation(msg)) => assert!(msg.contains("25030005")),
        other => panic!("Expected enrollment collision, got {:?}", other.map(|s| s.id)),
    }
}

#[rocket::async_test]
async fn test_inactive_students_hidden_by_default() {
    let test_db = TestDbBuilder::new()
        .student("GR-1", "Asha", "3", "Dhruv", None)
        .student("GR-2", "Bharat", "3", "Dhruv", None)
        .build()
        .await
        .expect("Failed to build test database");
    let pool = &test_db.pool;
    let id = test_db.student_id("GR-1").expect("Student not found");

    update_student(
        pool,
        id,
        &StudentUpdate {
            status: Some(StudentStatus::Inactive),
            ..Default::default()
        },
        ADMISSION_YEAR,
    )
    .await
    .expect("Failed to deactivate student");

    let active = get_students_in_class(pool, "3", "Dhruv", false)
        .await
        .expect("Failed to list class");
    assert_eq!(active.len(), 1);

    let all = get_students_in_class(pool, "3", "Dhruv", true)
        .await
        .expect("Failed to list class");
    assert_eq!(all.len(), 2);

    // Inactive students still hold their roll number.
    let created = create_student(pool, &new_student("GR-3", "3", "Dhruv", None), 2025)
        .await
        .expect("Failed to create student");
    assert_eq!(created.roll_no, 3);
}

#[rocket::async_test]
async fn test_delete_student() {
    let test_db = TestDbBuilder::new()
        .student("GR-1", "Asha", "3", "Dhruv", None)
        .build()
        .await
        .expect("Failed to build test database");
    let pool = &test_db.pool;
    let id = test_db.student_id("GR-1").expect("Student not found");

    delete_student(pool, id).await.expect("Failed to delete student");

    assert!(matches!(get_student(pool, id).await, Err(AppError::NotFound(_))));
    assert!(matches!(delete_student(pool, id).await, Err(AppError::NotFound(_))));
}
