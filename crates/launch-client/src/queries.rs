//! GraphQL documents, one per queue service operation.

pub const CREATE_LAUNCH_AGENT: &str = r#"
mutation createLaunchAgent($entity: String!, $project: String!, $queues: [String!]!, $hostname: String!) {
    createLaunchAgent(input: {entityName: $entity, projectName: $project, runQueues: $queues, hostname: $hostname}) {
        success
        launchAgentId
        name
    }
}"#;

pub const LAUNCH_AGENT: &str = r#"
query LaunchAgent($agentId: ID!) {
    launchAgent(id: $agentId) {
        name
        stopPolling
    }
}"#;

pub const UPDATE_LAUNCH_AGENT: &str = r#"
mutation updateLaunchAgent($agentId: ID!, $agentStatus: String!) {
    updateLaunchAgent(input: {launchAgentId: $agentId, agentStatus: $agentStatus}) {
        success
    }
}"#;

pub const JOB_SET_BY_SPEC: &str = r#"
query jobSetBySpec($name: String!, $entity: String!, $project: String!) {
    jobSetBySpec(name: $name, entityName: $entity, projectName: $project) {
        id
        name
        metadata
    }
}"#;

pub const JOB_SET_DIFF_BY_ID: &str = r#"
query jobSetDiffById($jobSetId: ID!, $knownVersion: Int!, $agentId: ID!) {
    jobSetDiffById(id: $jobSetId, knownVersion: $knownVersion, launchAgentId: $agentId) {
        version
        complete
        metadata
        upsertJobs
        removeJobs
    }
}"#;

pub const LEASE_JOB_SET_ITEM: &str = r#"
mutation leaseJobSetItem($jobSetId: ID!, $jobId: ID!, $agentId: ID!) {
    leaseJobSetItem(input: {jobSetId: $jobSetId, jobSetItemId: $jobId, launchAgentId: $agentId}) {
        success
    }
}"#;

pub const ACK_JOB_SET_ITEM: &str = r#"
mutation ackJobSetItem($jobSetId: ID!, $jobId: ID!, $agentId: ID!, $runName: String!) {
    ackJobSetItem(input: {jobSetId: $jobSetId, jobSetItemId: $jobId, launchAgentId: $agentId, runName: $runName}) {
        success
    }
}"#;

pub const FAIL_RUN_QUEUE_ITEM: &str = r#"
mutation failRunQueueItem($runQueueItemId: ID!, $message: String!, $stage: String!, $filePaths: [String!]) {
    failRunQueueItem(input: {runQueueItemId: $runQueueItemId, message: $message, stage: $stage, filePaths: $filePaths}) {
        success
    }
}"#;

pub const POP_FROM_RUN_QUEUE: &str = r#"
mutation popFromRunQueue($queueName: String!, $entityName: String!, $projectName: String!, $launchAgentId: ID) {
    popFromRunQueue(input: {queueName: $queueName, entityName: $entityName, projectName: $projectName, launchAgentId: $launchAgentId}) {
        runQueueItemId
        runSpec
        priority
        createdAt
        state
    }
}"#;

pub const RUN_QUEUE_ITEM: &str = r#"
query runQueueItem($queueName: String!, $entityName: String!, $projectName: String!, $itemId: ID!) {
    runQueueItem(queueName: $queueName, entityName: $entityName, projectName: $projectName, id: $itemId) {
        runQueueItemId
        runSpec
        priority
        createdAt
        state
    }
}"#;

pub const ACK_RUN_QUEUE_ITEM: &str = r#"
mutation ackRunQueueItem($itemId: ID!, $runId: String!, $launchAgentId: ID) {
    ackRunQueueItem(input: {runQueueItemId: $itemId, runName: $runId, launchAgentId: $launchAgentId}) {
        success
    }
}"#;
