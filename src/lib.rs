pub mod flowtsp_framework {
    pub mod flowtsp_command;
    pub mod flowtsp_input;
}
pub mod flowtsp_commands {
    pub mod flowtsp_command_brute_force;
    pub mod flowtsp_command_generate;
    pub mod flowtsp_command_solve;
}
pub mod flowtsp_objects {
    pub mod distance_matrix;
}
pub mod optimisation_algorithms {
    pub mod microlp_solver;
    pub mod mixed_integer_linear_programming;
}
pub mod techniques {
    pub mod brute_force;
    pub mod flow_formulation;
    pub mod flow_tsp;
    pub mod tour_decoder;
}
pub mod line_reader;
