use crate::models::{CourseOffering, Issue, Prescription, Recommendation};

pub const MAX_COURSES_PER_ISSUE: usize = 2;

fn matches_issue(course: &CourseOffering, issue: &Issue) -> bool {
    if course.pillar == Some(issue.pillar) {
        return true;
    }

    let theme = issue.theme.to_lowercase();
    course
        .tags
        .iter()
        .any(|tag| tag.pillar == issue.pillar && tag.theme.to_lowercase() == theme)
}

/// Most basic matching courses first; catalog order breaks level ties.
pub fn select_courses<'a>(
    issue: &Issue,
    catalog: &'a [CourseOffering],
) -> Vec<&'a CourseOffering> {
    let mut matches: Vec<&CourseOffering> = catalog
        .iter()
        .filter(|course| matches_issue(course, issue))
        .collect();
    matches.sort_by_key(|course| course.level);
    matches.truncate(MAX_COURSES_PER_ISSUE);
    matches
}

pub fn justification(issue: &Issue) -> String {
    format!(
        "Recomendado porque o tema \"{}\" apresenta desempenho {} no pilar {}, com interpretação {} (média {:.2}).",
        issue.theme,
        issue.severity.label(),
        issue.pillar.full_name(),
        issue.interpretation.label(),
        issue.evidence.theme_average
    )
}

/// Prescriptions for `issues`, which must already be ranked. Priority starts at
/// 1 and increases across the whole run.
pub fn prescribe(issues: &[Issue], catalog: &[CourseOffering]) -> Vec<Prescription> {
    let (prescriptions, _) = issues.iter().enumerate().fold(
        (Vec::new(), 1),
        |(mut acc, mut priority), (issue_index, issue)| {
            let text = justification(issue);
            for course in select_courses(issue, catalog) {
                acc.push(Prescription {
                    issue_index,
                    course_id: course.id,
                    course_title: course.title.clone(),
                    pillar: issue.pillar,
                    status: issue.severity,
                    interpretation: issue.interpretation,
                    justification: text.clone(),
                    target_agent: issue.interpretation.target_agent(),
                    priority,
                });
                priority += 1;
            }
            (acc, priority)
        },
    );
    prescriptions
}

pub fn flatten(prescriptions: &[Prescription]) -> Vec<Recommendation> {
    prescriptions
        .iter()
        .map(|p| Recommendation {
            course_id: p.course_id,
            description: p.justification.clone(),
            priority: p.priority,
        })
        .collect()
}
