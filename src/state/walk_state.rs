/// Navigation states of the catalog walk
///
/// The walk starts `AtRoot` (the semester's catalog entry page), descends
/// through faculty and subject listings to course lists and yields
/// course-detail pages. Pagination loops on `AtCourseList`; moving on to a
/// sibling subject goes back to `AtSubjectList`.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalkState {
    /// Catalog root of the selected semester, nothing fetched yet
    AtRoot,

    /// Listing of faculties (top level of the catalog tree)
    AtFacultyList,

    /// Listing of subjects or subject groups below a faculty
    AtSubjectList,

    /// Listing of courses, possibly one page of several
    AtCourseList,

    /// A course-detail page has been handed out
    AtCourseDetail,

    /// Every reachable listing has been visited
    Done,
}

impl WalkState {
    /// Classifies a listing page by its depth below the catalog root and
    /// whether it lists courses
    pub fn for_listing(depth: usize, lists_courses: bool) -> Self {
        match (depth, lists_courses) {
            (_, true) => Self::AtCourseList,
            (0, false) => Self::AtFacultyList,
            _ => Self::AtSubjectList,
        }
    }

    /// Returns true if the walk is allowed to move from `self` to `next`
    pub fn can_transition_to(&self, next: WalkState) -> bool {
        use WalkState::*;
        match (self, next) {
            (Done, _) => false,
            (_, Done) => true,
            (AtRoot, AtFacultyList | AtSubjectList | AtCourseList) => true,
            (AtRoot, _) => false,
            (_, AtRoot) => false,
            (AtCourseList | AtCourseDetail, AtCourseDetail) => true,
            (_, AtCourseDetail) => false,
            (_, AtFacultyList | AtSubjectList | AtCourseList) => true,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AtRoot => "at_root",
            Self::AtFacultyList => "at_faculty_list",
            Self::AtSubjectList => "at_subject_list",
            Self::AtCourseList => "at_course_list",
            Self::AtCourseDetail => "at_course_detail",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for WalkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_listing() {
        assert_eq!(WalkState::for_listing(0, false), WalkState::AtFacultyList);
        assert_eq!(WalkState::for_listing(1, false), WalkState::AtSubjectList);
        assert_eq!(WalkState::for_listing(3, false), WalkState::AtSubjectList);
        assert_eq!(WalkState::for_listing(0, true), WalkState::AtCourseList);
        assert_eq!(WalkState::for_listing(2, true), WalkState::AtCourseList);
    }

    #[test]
    fn test_forward_path() {
        let path = [
            WalkState::AtRoot,
            WalkState::AtFacultyList,
            WalkState::AtSubjectList,
            WalkState::AtCourseList,
            WalkState::AtCourseDetail,
            WalkState::Done,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_back_edges() {
        // pagination
        assert!(WalkState::AtCourseDetail.can_transition_to(WalkState::AtCourseList));
        assert!(WalkState::AtCourseList.can_transition_to(WalkState::AtCourseList));
        // sibling subjects
        assert!(WalkState::AtCourseDetail.can_transition_to(WalkState::AtSubjectList));
        assert!(WalkState::AtCourseList.can_transition_to(WalkState::AtSubjectList));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!WalkState::AtRoot.can_transition_to(WalkState::AtCourseDetail));
        assert!(!WalkState::AtSubjectList.can_transition_to(WalkState::AtCourseDetail));
        assert!(!WalkState::AtCourseList.can_transition_to(WalkState::AtRoot));
        assert!(!WalkState::Done.can_transition_to(WalkState::AtFacultyList));
    }

    #[test]
    fn test_terminal() {
        assert!(WalkState::Done.is_terminal());
        assert!(!WalkState::AtCourseDetail.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", WalkState::AtRoot), "at_root");
        assert_eq!(format!("{}", WalkState::AtCourseList), "at_course_list");
    }
}
