use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "proc-ctl")]
#[command(version, about = "Spawn and track child processes over a JSON-lines protocol", long_about = None)]
#[command(after_help = "PROTOCOL:
    Each stdin line is one request, each stdout line one reply.

    {\"id\": 1, \"op\": \"run\", \"args\": {\"cmd\": [\"sleep\", \"5\"]}}
    {\"id\": 2, \"op\": \"kill\", \"args\": {\"pid\": 4242, \"signal\": 15}}
    {\"id\": 3, \"op\": \"run_status\", \"args\": {\"processHandle\": 1}}
    {\"id\": 4, \"op\": \"close\", \"args\": {\"rid\": 1}}
    {\"id\": 5, \"op\": \"read_pipe\", \"args\": {\"rid\": 2}}
    {\"id\": 6, \"op\": \"write_pipe\", \"args\": {\"rid\": 3, \"data\": \"input\"}}

    run_status, read_pipe and write_pipe answer when they complete, so their
    replies can arrive after later ones. Match replies by id.

    Replies are {\"id\": n, \"ok\": ...} or {\"id\": n, \"error\": {\"kind\": ..., \"message\": ...}}.
")]
pub struct Cli {
    /// Show verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the registered operation names and exit
    #[arg(long)]
    pub list_ops: bool,

    /// Signal children still running when input ends
    #[arg(short, long)]
    pub kill_on_exit: bool,

    /// Signal number used by --kill-on-exit
    #[arg(short, long, value_name = "SIGNO", default_value_t = 9)]
    pub signal: i32,
}
